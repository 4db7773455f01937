//! Multi-document container.
//!
//! A `MultiPack` owns an ordered list of sub-packs plus its own store of
//! cross-document links and groups. Those relations address their targets
//! as [`SubEntry`] values, resolved in two hops: sub-pack by index, then
//! entry by id inside that sub-pack.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::store::EntryStore;
use crate::{
    DataPack, Entry, EntryContainer, EntryId, FieldValue, IndexConfig, NewEntry, PackConfig,
    PackError, PackId, PackResult, Role, SchemaRegistry, SubEntry,
};

/// Several documents plus the relations that span them.
#[derive(Debug)]
pub struct MultiPack {
    packs: Vec<DataPack>,
    store: EntryStore<SubEntry>,
}

fn pack_at(packs: &[DataPack], pack_index: usize) -> PackResult<&DataPack> {
    packs.get(pack_index).ok_or(PackError::IndexOutOfRange {
        pack_index,
        len: packs.len(),
    })
}

fn resolve_in(packs: &[DataPack], address: SubEntry) -> PackResult<&Entry> {
    pack_at(packs, address.pack_index())?.get_entry(address.entry_id())
}

fn type_in(packs: &[DataPack], address: SubEntry) -> PackResult<String> {
    Ok(resolve_in(packs, address)?.type_name.clone())
}

impl MultiPack {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(registry, PackConfig::default())
    }

    pub fn with_config(registry: Arc<SchemaRegistry>, config: PackConfig) -> Self {
        Self {
            packs: Vec::new(),
            store: EntryStore::new(registry, &config),
        }
    }

    pub fn pack_id(&self) -> PackId {
        self.store.pack_id()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.store.registry()
    }

    pub fn config(&self) -> PackConfig {
        self.store.config()
    }

    /// Append a sub-pack, returning its index.
    pub fn add_pack(&mut self, pack: DataPack) -> usize {
        self.packs.push(pack);
        let pack_index = self.packs.len() - 1;
        tracing::debug!(multi_pack = %self.pack_id(), pack_index, "added sub-pack");
        pack_index
    }

    pub fn pack(&self, pack_index: usize) -> PackResult<&DataPack> {
        pack_at(&self.packs, pack_index)
    }

    pub fn pack_mut(&mut self, pack_index: usize) -> PackResult<&mut DataPack> {
        let len = self.packs.len();
        self.packs
            .get_mut(pack_index)
            .ok_or(PackError::IndexOutOfRange { pack_index, len })
    }

    pub fn packs(&self) -> &[DataPack] {
        &self.packs
    }

    pub fn num_packs(&self) -> usize {
        self.packs.len()
    }

    /// Number of cross-document entries, not counting sub-pack entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cross-document entries, in id order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.store.iter()
    }

    pub fn get_entry(&self, id: EntryId) -> PackResult<&Entry> {
        self.store.get(id)
    }

    pub fn validate(&self, entry: &Entry) -> PackResult<()> {
        self.store.validate(entry)
    }

    /// The entry `address` names, looked up in its sub-pack.
    pub fn resolve(&self, address: SubEntry) -> PackResult<&Entry> {
        resolve_in(&self.packs, address)
    }

    /// Create a cross-document link or group.
    ///
    /// Every endpoint and member must resolve in its sub-pack and satisfy
    /// the type's declared capabilities.
    pub fn create_entry(&mut self, new: NewEntry<SubEntry>) -> PackResult<EntryId> {
        let targets = new
            .addresses()
            .map(|address| type_in(&self.packs, address).map(|type_name| (address, type_name)))
            .collect::<PackResult<BTreeMap<_, _>>>()?;
        self.store.create(new, &targets)
    }

    pub fn set_endpoint(&mut self, link: EntryId, role: Role, target: SubEntry) -> PackResult<()> {
        let target_type = type_in(&self.packs, target)?;
        self.store.set_endpoint(link, role, target, &target_type)?;
        Ok(())
    }

    pub fn set_parent(&mut self, link: EntryId, target: SubEntry) -> PackResult<()> {
        self.set_endpoint(link, Role::Parent, target)
    }

    pub fn set_child(&mut self, link: EntryId, target: SubEntry) -> PackResult<()> {
        self.set_endpoint(link, Role::Child, target)
    }

    /// Add one member. Returns false if it was already a member.
    pub fn add_member(&mut self, group: EntryId, member: SubEntry) -> PackResult<bool> {
        Ok(self.add_members(group, [member])? == 1)
    }

    /// Add several members, all or nothing. Returns how many were new.
    pub fn add_members(
        &mut self,
        group: EntryId,
        members: impl IntoIterator<Item = SubEntry>,
    ) -> PackResult<usize> {
        let members = members
            .into_iter()
            .map(|address| type_in(&self.packs, address).map(|type_name| (address, type_name)))
            .collect::<PackResult<Vec<_>>>()?;
        self.store.add_members(group, &members)
    }

    pub fn clear_members(&mut self, group: EntryId) -> PackResult<usize> {
        self.store.clear_members(group)
    }

    pub fn set_fields<K, V>(
        &mut self,
        id: EntryId,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> PackResult<()>
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let values = values
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self.store.set_fields(id, values)
    }

    pub fn record_fields(
        &mut self,
        ids: &[EntryId],
        fields: &[&str],
        creator: &str,
    ) -> PackResult<()> {
        self.store.record_fields(ids, fields, creator)
    }

    pub fn fields_created(&self, type_name: &str, creator: &str) -> impl Iterator<Item = &str> {
        self.store.fields_created(type_name, creator)
    }

    pub fn default_creator(&self, type_name: &str) -> Option<&str> {
        self.store.default_creator(type_name)
    }

    /// Remove a cross-document entry. The returned entry has no owner.
    pub fn remove_entry(&mut self, id: EntryId) -> PackResult<Entry> {
        self.store.remove(id)
    }

    /// Cross-document entries of `type_name` or any subtype, in id order.
    pub fn query_entries<'a>(
        &'a self,
        type_name: &str,
    ) -> PackResult<Box<dyn Iterator<Item = &'a Entry> + 'a>> {
        self.store.query(type_name, None)
    }

    pub fn links_from(&self, parent: SubEntry, link_type: Option<&str>) -> PackResult<Vec<&Entry>> {
        self.store.links_with(Role::Parent, parent, link_type)
    }

    pub fn links_to(&self, child: SubEntry, link_type: Option<&str>) -> PackResult<Vec<&Entry>> {
        self.store.links_with(Role::Child, child, link_type)
    }

    pub fn groups_containing(
        &self,
        member: SubEntry,
        group_type: Option<&str>,
    ) -> PackResult<Vec<&Entry>> {
        self.store.groups_with(member, group_type)
    }

    pub fn entries_by_creator<'a>(&'a self, creator: &str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.store.by_creator(creator)
    }

    pub fn set_index_config(&mut self, config: IndexConfig) {
        self.store.set_index_config(config);
    }

    pub(crate) fn reserved_id(&self) -> EntryId {
        self.store.reserved_id()
    }

    pub(crate) fn resume_ids(&mut self, next: EntryId) {
        self.store.resume_ids(next);
    }

    pub(crate) fn restore_entry(&mut self, entry: Entry) -> PackResult<Vec<(Role, SubEntry)>> {
        self.store.restore(entry)
    }
}

impl EntryContainer for MultiPack {
    type Address = SubEntry;

    fn pack_id(&self) -> PackId {
        self.store.pack_id()
    }

    fn registry(&self) -> &SchemaRegistry {
        self.store.registry()
    }

    fn get_entry(&self, id: EntryId) -> PackResult<&Entry> {
        self.store.get(id)
    }

    fn resolve(&self, address: SubEntry) -> PackResult<&Entry> {
        resolve_in(&self.packs, address)
    }

    fn validate(&self, entry: &Entry) -> PackResult<()> {
        self.store.validate(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntryTypeDecl;

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new()
            .with(EntryTypeDecl::annotation("Sentence"))
            .and_then(|r| r.with(EntryTypeDecl::annotation("Token")))
            .and_then(|r| {
                r.with(EntryTypeDecl::multi_pack_link(
                    "Alignment",
                    "Sentence",
                    "Sentence",
                ))
            })
            .and_then(|r| r.with(EntryTypeDecl::multi_pack_group("Cluster", "Token")))
            .unwrap();
        Arc::new(registry)
    }

    fn multi_pack() -> (MultiPack, SubEntry, SubEntry) {
        let registry = registry();
        let mut en = DataPack::new("Hello.", registry.clone());
        let de = DataPack::new("Hallo.", registry.clone());
        let hello = en.create_entry(NewEntry::annotation("Sentence", 0, 6)).unwrap();
        let mut multi = MultiPack::new(registry);
        let en = multi.add_pack(en);
        let de = multi.add_pack(de);
        let hallo = multi
            .pack_mut(de)
            .unwrap()
            .create_entry(NewEntry::annotation("Sentence", 0, 6))
            .unwrap();
        (multi, SubEntry::new(en, hello), SubEntry::new(de, hallo))
    }

    #[test]
    fn test_two_hop_resolution() {
        let (mut multi, hello, hallo) = multi_pack();
        let link = multi
            .create_entry(NewEntry::link("Alignment").parent(hello).child(hallo))
            .unwrap();

        let child = multi.get_child(link).unwrap();
        assert_eq!(multi.pack(1).unwrap().text_of(child).unwrap(), "Hallo.");
        assert_eq!(multi.links_from(hello, None).unwrap().len(), 1);
        assert_eq!(multi.links_to(hello, Some("Alignment")).unwrap().len(), 0);
    }

    #[test]
    fn test_unresolvable_target_rejected() {
        let (mut multi, hello, _) = multi_pack();
        let err = multi
            .create_entry(
                NewEntry::link("Alignment")
                    .parent(hello)
                    .child(SubEntry::new(7, EntryId::new(0))),
            )
            .unwrap_err();
        assert_eq!(err, PackError::IndexOutOfRange { pack_index: 7, len: 2 });
        assert!(multi.is_empty());
    }

    #[test]
    fn test_capability_checks_resolved_type() {
        let (mut multi, hello, _) = multi_pack();
        let cluster = multi.create_entry(NewEntry::group("Cluster")).unwrap();
        let err = multi.add_member(cluster, hello).unwrap_err();
        assert!(matches!(
            err,
            PackError::TypeMismatch { ref expected, ref actual, .. }
                if expected == "Token" && actual == "Sentence"
        ));
    }

    #[test]
    fn test_removed_sub_entry_dangles() {
        let (mut multi, hello, hallo) = multi_pack();
        let link = multi
            .create_entry(NewEntry::link("Alignment").parent(hello).child(hallo))
            .unwrap();
        multi
            .pack_mut(hallo.pack_index())
            .unwrap()
            .remove_entry(hallo.entry_id())
            .unwrap();

        assert!(multi.get_parent(link).is_ok());
        assert!(matches!(
            multi.get_child(link),
            Err(PackError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_annotations_rejected() {
        let (mut multi, _, _) = multi_pack();
        let err = multi.create_entry(NewEntry::group("Sentence")).unwrap_err();
        assert!(matches!(err, PackError::SchemaViolation { .. }));
    }
}
