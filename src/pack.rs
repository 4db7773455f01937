//! Single-document container.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::store::EntryStore;
use crate::{
    Address, Entry, EntryArgs, EntryId, FieldValue, IndexConfig, NewEntry, PackConfig, PackError,
    PackId, PackResult, Role, SchemaRegistry, Span,
};

/// Read access shared by [`DataPack`] and [`crate::MultiPack`].
///
/// Relations store addresses only. The provided methods turn them back into
/// entries by asking the container, so a relation whose target has been
/// removed fails with `DanglingReference` instead of yielding a stale entry.
pub trait EntryContainer {
    /// How relations in this container address their targets.
    type Address: Address;

    fn pack_id(&self) -> PackId;

    fn registry(&self) -> &SchemaRegistry;

    /// Look up an entry of this container by id.
    fn get_entry(&self, id: EntryId) -> PackResult<&Entry>;

    /// Look up the entry a relation address names.
    fn resolve(&self, address: Self::Address) -> PackResult<&Entry>;

    /// Check that `entry` belongs to this container and matches its declaration.
    fn validate(&self, entry: &Entry) -> PackResult<()>;

    /// Fails unless `relation` is attached to this container.
    fn check_attached(&self, relation: &Entry) -> PackResult<()> {
        match relation.owner {
            Some(owner) if owner == self.pack_id() => Ok(()),
            Some(owner) => Err(PackError::OwnerMismatch {
                id: relation.id,
                expected: self.pack_id(),
                actual: owner,
            }),
            None => Err(PackError::DanglingReference {
                id: relation.id,
                entry_type: relation.type_name.clone(),
                target: "its owner".to_string(),
            }),
        }
    }

    /// The address stored in one endpoint of `link`.
    fn endpoint_address(&self, link: &Entry, role: Role) -> PackResult<Self::Address> {
        self.check_attached(link)?;
        let body = Self::Address::link_of(&link.body).ok_or_else(|| {
            PackError::schema(&link.type_name, format!("entry {} is not a link", link.id))
        })?;
        body.endpoint(role).ok_or(PackError::IncompleteEntry {
            id: link.id,
            entry_type: link.type_name.clone(),
            role,
        })
    }

    fn endpoint_of<'a>(&'a self, link: &Entry, role: Role) -> PackResult<&'a Entry> {
        let address = self.endpoint_address(link, role)?;
        self.resolve(address)
            .map_err(|err| dangling(err, link, address))
    }

    fn parent_of<'a>(&'a self, link: &Entry) -> PackResult<&'a Entry> {
        self.endpoint_of(link, Role::Parent)
    }

    fn child_of<'a>(&'a self, link: &Entry) -> PackResult<&'a Entry> {
        self.endpoint_of(link, Role::Child)
    }

    fn get_parent(&self, link_id: EntryId) -> PackResult<&Entry> {
        self.parent_of(self.get_entry(link_id)?)
    }

    fn get_child(&self, link_id: EntryId) -> PackResult<&Entry> {
        self.child_of(self.get_entry(link_id)?)
    }

    /// Resolve every member of `group`.
    ///
    /// The first member that no longer resolves fails the whole call; a
    /// partial member list is never returned.
    fn members_of<'a>(&'a self, group: &Entry) -> PackResult<Vec<&'a Entry>> {
        self.check_attached(group)?;
        let body = Self::Address::group_of(&group.body).ok_or_else(|| {
            PackError::schema(&group.type_name, format!("entry {} is not a group", group.id))
        })?;
        body.members()
            .map(|member| {
                self.resolve(member)
                    .map_err(|err| dangling(err, group, member))
            })
            .collect()
    }

    fn get_members(&self, group_id: EntryId) -> PackResult<Vec<&Entry>> {
        self.members_of(self.get_entry(group_id)?)
    }

    fn num_members(&self, group_id: EntryId) -> PackResult<usize> {
        let group = self.get_entry(group_id)?;
        Self::Address::group_of(&group.body)
            .map(|body| body.num_members())
            .ok_or_else(|| {
                PackError::schema(&group.type_name, format!("entry {} is not a group", group_id))
            })
    }
}

/// Lookup failures on a stored address mean the target is gone.
fn dangling<A: Address>(err: PackError, relation: &Entry, address: A) -> PackError {
    match err {
        PackError::UnknownId { .. } | PackError::IndexOutOfRange { .. } => {
            PackError::DanglingReference {
                id: relation.id,
                entry_type: relation.type_name.clone(),
                target: address.to_string(),
            }
        }
        other => other,
    }
}

/// One document: its text plus every entry annotating it.
///
/// ```
/// use std::sync::Arc;
/// use layered_pack::{DataPack, EntryContainer, EntryTypeDecl, NewEntry, SchemaRegistry};
///
/// let registry = SchemaRegistry::new()
///     .with(EntryTypeDecl::annotation("Token"))
///     .and_then(|r| r.with(EntryTypeDecl::link("Dependency", "Token", "Token")))
///     .unwrap();
/// let mut pack = DataPack::new("Alice sleeps", Arc::new(registry));
///
/// let alice = pack.create_entry(NewEntry::annotation("Token", 0, 5)).unwrap();
/// let sleeps = pack.create_entry(NewEntry::annotation("Token", 6, 12)).unwrap();
/// let dep = pack
///     .create_entry(NewEntry::link("Dependency").parent(sleeps).child(alice))
///     .unwrap();
///
/// let child = pack.get_child(dep).unwrap();
/// assert_eq!(pack.text_of(child).unwrap(), "Alice");
/// ```
#[derive(Debug)]
pub struct DataPack {
    text: String,
    store: EntryStore<EntryId>,
}

impl DataPack {
    pub fn new(text: impl Into<String>, registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(text, registry, PackConfig::default())
    }

    pub fn with_config(
        text: impl Into<String>,
        registry: Arc<SchemaRegistry>,
        config: PackConfig,
    ) -> Self {
        Self {
            text: text.into(),
            store: EntryStore::new(registry, &config),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pack_id(&self) -> PackId {
        self.store.pack_id()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.store.registry()
    }

    /// The live configuration, reflecting any index toggles since construction.
    pub fn config(&self) -> PackConfig {
        self.store.config()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, in id order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.store.iter()
    }

    pub fn get_entry(&self, id: EntryId) -> PackResult<&Entry> {
        self.store.get(id)
    }

    pub fn validate(&self, entry: &Entry) -> PackResult<()> {
        self.store.validate(entry)
    }

    fn check_bounds(&self, id: EntryId, span: Span) -> PackResult<()> {
        let in_text = span.end() <= self.text.len()
            && self.text.is_char_boundary(span.begin())
            && self.text.is_char_boundary(span.end());
        if in_text {
            Ok(())
        } else {
            Err(PackError::SpanOutOfBounds {
                id,
                span,
                text_len: self.text.len(),
            })
        }
    }

    fn type_of(&self, id: EntryId) -> PackResult<String> {
        Ok(self.store.get(id)?.type_name.clone())
    }

    /// Create an entry, assigning its id and indexing it in one step.
    ///
    /// Annotation bounds are byte offsets into the text and must fall on
    /// character boundaries. Link endpoints and group members must already
    /// exist in this pack and satisfy the type's declared capabilities.
    pub fn create_entry(&mut self, new: NewEntry) -> PackResult<EntryId> {
        if let EntryArgs::Annotation { begin, end } = new.args {
            self.check_bounds(self.store.reserved_id(), Span::new(begin, end)?)?;
        }
        let targets = new
            .addresses()
            .map(|id| self.type_of(id).map(|type_name| (id, type_name)))
            .collect::<PackResult<BTreeMap<_, _>>>()?;
        self.store.create(new, &targets)
    }

    /// Set one endpoint of a link to `target`, replacing any previous one.
    pub fn set_endpoint(&mut self, link: EntryId, role: Role, target: EntryId) -> PackResult<()> {
        let target_type = self.type_of(target)?;
        self.store.set_endpoint(link, role, target, &target_type)?;
        Ok(())
    }

    pub fn set_parent(&mut self, link: EntryId, target: EntryId) -> PackResult<()> {
        self.set_endpoint(link, Role::Parent, target)
    }

    pub fn set_child(&mut self, link: EntryId, target: EntryId) -> PackResult<()> {
        self.set_endpoint(link, Role::Child, target)
    }

    /// Add one member. Returns false if it was already a member.
    pub fn add_member(&mut self, group: EntryId, member: EntryId) -> PackResult<bool> {
        Ok(self.add_members(group, [member])? == 1)
    }

    /// Add several members, all or nothing. Returns how many were new.
    pub fn add_members(
        &mut self,
        group: EntryId,
        members: impl IntoIterator<Item = EntryId>,
    ) -> PackResult<usize> {
        let members = members
            .into_iter()
            .map(|id| self.type_of(id).map(|type_name| (id, type_name)))
            .collect::<PackResult<Vec<_>>>()?;
        self.store.add_members(group, &members)
    }

    /// Empty a group. Returns how many members it held.
    pub fn clear_members(&mut self, group: EntryId) -> PackResult<usize> {
        self.store.clear_members(group)
    }

    /// Replace an annotation's span.
    pub fn set_span(&mut self, id: EntryId, begin: usize, end: usize) -> PackResult<()> {
        let span = Span::new(begin, end)?;
        self.check_bounds(id, span)?;
        self.store.set_span(id, span)?;
        Ok(())
    }

    /// Write declared fields; names land in the entry's modified-field set.
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

    /// Record that `creator` produced `fields` on the entries `ids`.
    pub fn record_fields(
        &mut self,
        ids: &[EntryId],
        fields: &[&str],
        creator: &str,
    ) -> PackResult<()> {
        self.store.record_fields(ids, fields, creator)
    }

    /// Fields `creator` recorded for `type_name`.
    pub fn fields_created(&self, type_name: &str, creator: &str) -> impl Iterator<Item = &str> {
        self.store.fields_created(type_name, creator)
    }

    /// The first creator recorded for `type_name`, used for new entries of
    /// that type created without one.
    pub fn default_creator(&self, type_name: &str) -> Option<&str> {
        self.store.default_creator(type_name)
    }

    /// Remove an entry from the pack.
    ///
    /// The returned entry has no owner. Relations still holding its id fail
    /// to resolve it from now on.
    pub fn remove_entry(&mut self, id: EntryId) -> PackResult<Entry> {
        self.store.remove(id)
    }

    /// Text covered by an annotation.
    pub fn text_of(&self, entry: &Entry) -> PackResult<&str> {
        match entry.owner {
            None => {
                return Err(PackError::OrphanEntry {
                    id: entry.id,
                    entry_type: entry.type_name.clone(),
                })
            }
            Some(owner) if owner != self.pack_id() => {
                return Err(PackError::OwnerMismatch {
                    id: entry.id,
                    expected: self.pack_id(),
                    actual: owner,
                })
            }
            Some(_) => {}
        }
        let span = entry.span().ok_or_else(|| {
            PackError::schema(&entry.type_name, format!("entry {} has no span", entry.id))
        })?;
        self.text
            .get(span.begin()..span.end())
            .ok_or(PackError::SpanOutOfBounds {
                id: entry.id,
                span,
                text_len: self.text.len(),
            })
    }

    pub fn entry_text(&self, id: EntryId) -> PackResult<&str> {
        self.text_of(self.get_entry(id)?)
    }

    /// Entries of `type_name` or any of its subtypes.
    ///
    /// Each call returns a fresh iterator over the current state. Annotations
    /// are ordered by span, then id; other kinds by id. With `within`, only
    /// entries lying inside that span are returned: annotations whose span
    /// it contains, links whose endpoints both are such annotations, and
    /// non-empty groups whose members all are.
    pub fn query_entries<'a>(
        &'a self,
        type_name: &str,
        within: Option<Span>,
    ) -> PackResult<Box<dyn Iterator<Item = &'a Entry> + 'a>> {
        let entries = self.store.query(type_name, within)?;
        match within {
            Some(span) if !self.store.registry().is_instance(type_name, "Annotation") => Ok(
                Box::new(entries.filter(move |entry| self.lies_within(entry, span))),
            ),
            _ => Ok(entries),
        }
    }

    /// Entries of `inner_type` lying inside the annotation `outer`.
    pub fn covered_by<'a>(
        &'a self,
        outer: EntryId,
        inner_type: &str,
    ) -> PackResult<Box<dyn Iterator<Item = &'a Entry> + 'a>> {
        let outer = self.get_entry(outer)?;
        let span = outer.span().ok_or_else(|| {
            PackError::schema(&outer.type_name, format!("entry {} is not an annotation", outer.id))
        })?;
        self.query_entries(inner_type, Some(span))
    }

    fn lies_within(&self, entry: &Entry, span: Span) -> bool {
        let annotation_inside = |id: EntryId| {
            self.store
                .get(id)
                .ok()
                .and_then(Entry::span)
                .map_or(false, |inner| span.contains(&inner))
        };
        if let Some(inner) = entry.span() {
            return span.contains(&inner);
        }
        if let Some(link) = entry.as_link() {
            return match (link.parent(), link.child()) {
                (Some(parent), Some(child)) => {
                    annotation_inside(parent) && annotation_inside(child)
                }
                _ => false,
            };
        }
        if let Some(group) = entry.as_group() {
            return !group.is_empty() && group.members().all(annotation_inside);
        }
        false
    }

    /// Links whose parent is `parent`, optionally restricted to one link type.
    pub fn links_from(&self, parent: EntryId, link_type: Option<&str>) -> PackResult<Vec<&Entry>> {
        self.store.links_with(Role::Parent, parent, link_type)
    }

    /// Links whose child is `child`, optionally restricted to one link type.
    pub fn links_to(&self, child: EntryId, link_type: Option<&str>) -> PackResult<Vec<&Entry>> {
        self.store.links_with(Role::Child, child, link_type)
    }

    /// Groups holding `member`, optionally restricted to one group type.
    pub fn groups_containing(
        &self,
        member: EntryId,
        group_type: Option<&str>,
    ) -> PackResult<Vec<&Entry>> {
        self.store.groups_with(member, group_type)
    }

    pub fn entries_by_creator<'a>(&'a self, creator: &str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.store.by_creator(creator)
    }

    /// Turn optional indices on or off. Query results are unaffected.
    pub fn set_index_config(&mut self, config: IndexConfig) {
        self.store.set_index_config(config);
    }

    pub(crate) fn reserved_id(&self) -> EntryId {
        self.store.reserved_id()
    }

    pub(crate) fn resume_ids(&mut self, next: EntryId) {
        self.store.resume_ids(next);
    }

    pub(crate) fn restore_entry(&mut self, entry: Entry) -> PackResult<Vec<(Role, EntryId)>> {
        if let Some(span) = entry.span() {
            self.check_bounds(entry.id, span)?;
        }
        self.store.restore(entry)
    }
}

impl EntryContainer for DataPack {
    type Address = EntryId;

    fn pack_id(&self) -> PackId {
        self.store.pack_id()
    }

    fn registry(&self) -> &SchemaRegistry {
        self.store.registry()
    }

    fn get_entry(&self, id: EntryId) -> PackResult<&Entry> {
        self.store.get(id)
    }

    fn resolve(&self, address: EntryId) -> PackResult<&Entry> {
        self.store.get(address)
    }

    fn validate(&self, entry: &Entry) -> PackResult<()> {
        self.store.validate(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryTypeDecl, FieldType};

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new()
            .with(EntryTypeDecl::annotation("Token").field("pos", FieldType::Str))
            .and_then(|r| r.with(EntryTypeDecl::annotation("Sentence")))
            .and_then(|r| r.with(EntryTypeDecl::link("Dependency", "Token", "Token")))
            .and_then(|r| r.with(EntryTypeDecl::link("SentenceLink", "Sentence", "Sentence")))
            .and_then(|r| r.with(EntryTypeDecl::group("Chain", "Token")))
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_text_of_annotation() {
        let mut pack = DataPack::new("héllo world", registry());
        let id = pack.create_entry(NewEntry::annotation("Token", 0, 6)).unwrap();
        assert_eq!(pack.entry_text(id).unwrap(), "héllo");
    }

    #[test]
    fn test_span_outside_text() {
        let mut pack = DataPack::new("short", registry());
        let err = pack.create_entry(NewEntry::annotation("Token", 2, 9)).unwrap_err();
        assert!(matches!(err, PackError::SpanOutOfBounds { text_len: 5, .. }));

        let mut pack = DataPack::new("héllo", registry());
        let err = pack.create_entry(NewEntry::annotation("Token", 0, 2)).unwrap_err();
        assert!(matches!(err, PackError::SpanOutOfBounds { .. }));
    }

    #[test]
    fn test_removed_entry_is_orphan() {
        let mut pack = DataPack::new("one two", registry());
        let id = pack.create_entry(NewEntry::annotation("Token", 0, 3)).unwrap();
        let removed = pack.remove_entry(id).unwrap();

        assert!(!removed.is_attached());
        assert!(matches!(
            pack.text_of(&removed),
            Err(PackError::OrphanEntry { .. })
        ));
        assert!(matches!(
            pack.get_entry(id),
            Err(PackError::UnknownId { .. })
        ));
    }

    #[test]
    fn test_entry_from_other_pack() {
        let mut a = DataPack::new("one", registry());
        let b = DataPack::new("one", registry());
        let id = a.create_entry(NewEntry::annotation("Token", 0, 3)).unwrap();
        let entry = a.get_entry(id).unwrap();

        assert!(matches!(
            b.text_of(entry),
            Err(PackError::OwnerMismatch { .. })
        ));
        assert!(matches!(
            b.validate(entry),
            Err(PackError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn test_unset_endpoint_is_incomplete() {
        let mut pack = DataPack::new("one", registry());
        let link = pack.create_entry(NewEntry::link("Dependency")).unwrap();
        assert!(matches!(
            pack.get_parent(link),
            Err(PackError::IncompleteEntry {
                role: Role::Parent,
                ..
            })
        ));
    }

    #[test]
    fn test_link_query_within_span() {
        let mut pack = DataPack::new("a b. c d.", registry());
        let first = pack.create_entry(NewEntry::annotation("Sentence", 0, 4)).unwrap();
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let b = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        let c = pack.create_entry(NewEntry::annotation("Token", 5, 6)).unwrap();
        let inside = pack
            .create_entry(NewEntry::link("Dependency").parent(a).child(b))
            .unwrap();
        pack.create_entry(NewEntry::link("Dependency").parent(b).child(c))
            .unwrap();
        pack.create_entry(NewEntry::group("Chain").members([a, b])).unwrap();
        let straddling = pack.create_entry(NewEntry::group("Chain").members([a, c])).unwrap();

        let links: Vec<_> = pack
            .covered_by(first, "Dependency")
            .unwrap()
            .map(Entry::id)
            .collect();
        assert_eq!(links, vec![inside]);

        let groups: Vec<_> = pack.covered_by(first, "Chain").unwrap().map(Entry::id).collect();
        assert_eq!(groups.len(), 1);
        assert!(!groups.contains(&straddling));

        let tokens: Vec<_> = pack.covered_by(first, "Token").unwrap().map(Entry::id).collect();
        assert_eq!(tokens, vec![a, b]);
    }

    #[test]
    fn test_set_span_moves_in_query_order() {
        let mut pack = DataPack::new("a b c", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let c = pack.create_entry(NewEntry::annotation("Token", 4, 5)).unwrap();

        pack.set_span(a, 2, 3).unwrap();
        let within = Span::new(0, 3).unwrap();
        let ids: Vec<_> = pack
            .query_entries("Token", Some(within))
            .unwrap()
            .map(Entry::id)
            .collect();
        assert_eq!(ids, vec![a]);

        pack.set_span(c, 0, 1).unwrap();
        let ids: Vec<_> = pack.query_entries("Token", None).unwrap().map(Entry::id).collect();
        assert_eq!(ids, vec![c, a]);
    }

    #[test]
    fn test_add_members_all_or_nothing() {
        let mut pack = DataPack::new("a b", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let s = pack.create_entry(NewEntry::annotation("Sentence", 0, 3)).unwrap();
        let chain = pack.create_entry(NewEntry::group("Chain")).unwrap();

        let err = pack.add_members(chain, [a, s]).unwrap_err();
        assert!(matches!(err, PackError::TypeMismatch { role: Role::Member, .. }));
        assert_eq!(pack.num_members(chain).unwrap(), 0);

        assert!(pack.add_member(chain, a).unwrap());
        assert!(!pack.add_member(chain, a).unwrap());
        assert_eq!(pack.clear_members(chain).unwrap(), 1);
        assert_eq!(pack.num_members(chain).unwrap(), 0);
    }

    #[test]
    fn test_unknown_query_type() {
        let pack = DataPack::new("", registry());
        assert!(matches!(
            pack.query_entries("Nope", None),
            Err(PackError::SchemaViolation { .. })
        ));
    }
}
