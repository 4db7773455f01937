//! Persisted state for packs and multi-packs, encoded as RON.
//!
//! Entries are written with their ids, creators, field values and bodies;
//! link endpoints and group members are written as raw addresses, and the
//! next free id is written alongside so ids of removed entries stay retired.
//! Saving refuses a store whose relations no longer resolve. Loading never
//! trusts the stored state: every entry is re-validated against the
//! registry and every relation is re-installed through the checked setters,
//! so a stored relation whose target is missing or of the wrong type aborts
//! the load.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Address, DataPack, Entry, EntryContainer, EntryId, MultiPack, PackConfig, PackError,
    PackResult, Role, SchemaRegistry,
};

/// Serializable snapshot of one [`DataPack`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackState {
    pub text: String,
    pub entries: Vec<Entry>,
    /// Id the next created entry receives; restored ids raise it as needed
    #[serde(default)]
    pub next_id: EntryId,
}

/// Serializable snapshot of one [`MultiPack`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPackState {
    pub packs: Vec<PackState>,
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub next_id: EntryId,
}

fn encode<T: Serialize>(state: &T) -> PackResult<String> {
    let config = ron::ser::PrettyConfig::new()
        .depth_limit(8)
        .enumerate_arrays(false);
    ron::ser::to_string_pretty(state, config).map_err(|e| PackError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(source: &str) -> PackResult<T> {
    ron::from_str(source).map_err(|e| PackError::Serialization(e.to_string()))
}

/// Fails with `DanglingReference` on the first endpoint or member that no
/// longer resolves, since such a state could not be loaded back.
fn check_relations<C: EntryContainer>(container: &C, entries: &[Entry]) -> PackResult<()> {
    for entry in entries {
        if let Some(link) = <C::Address as Address>::link_of(&entry.body) {
            for (role, _) in link.endpoints() {
                container.endpoint_of(entry, role)?;
            }
        } else if <C::Address as Address>::group_of(&entry.body).is_some() {
            container.members_of(entry)?;
        }
    }
    Ok(())
}

impl PackState {
    pub fn to_ron(&self) -> PackResult<String> {
        encode(self)
    }

    pub fn from_ron(source: &str) -> PackResult<Self> {
        decode(source)
    }
}

impl MultiPackState {
    pub fn to_ron(&self) -> PackResult<String> {
        encode(self)
    }

    pub fn from_ron(source: &str) -> PackResult<Self> {
        decode(source)
    }
}

impl DataPack {
    /// Snapshot every entry, in id order.
    ///
    /// Fails if a link or group still refers to a removed entry.
    pub fn to_state(&self) -> PackResult<PackState> {
        let entries: Vec<Entry> = self.entries().cloned().collect();
        check_relations(self, &entries)?;
        Ok(PackState {
            text: self.text().to_string(),
            entries,
            next_id: self.reserved_id(),
        })
    }

    /// Rebuild a pack from a snapshot, re-running live validation.
    ///
    /// Entry ids are kept; new entries continue after both the stored next
    /// id and the largest restored id.
    pub fn from_state(
        state: PackState,
        registry: Arc<SchemaRegistry>,
        config: PackConfig,
    ) -> PackResult<Self> {
        let mut pack = DataPack::with_config(state.text, registry, config);
        let mut pending = Vec::new();
        for entry in state.entries {
            let id = entry.id();
            pending.push((id, pack.restore_entry(entry)?));
        }
        for (id, relations) in pending {
            install(id, relations, |id, role, address| match role {
                Role::Member => pack.add_members(id, [address]).map(drop),
                _ => pack.set_endpoint(id, role, address),
            })?;
        }
        pack.resume_ids(state.next_id);
        tracing::debug!(pack = %pack.pack_id(), entries = pack.len(), "restored pack");
        Ok(pack)
    }

    pub fn to_ron(&self) -> PackResult<String> {
        self.to_state()?.to_ron()
    }

    pub fn from_ron(
        source: &str,
        registry: Arc<SchemaRegistry>,
        config: PackConfig,
    ) -> PackResult<Self> {
        Self::from_state(PackState::from_ron(source)?, registry, config)
    }
}

impl MultiPack {
    /// Snapshot the sub-packs and the cross-document entries.
    ///
    /// Fails if any relation, in a sub-pack or across them, no longer resolves.
    pub fn to_state(&self) -> PackResult<MultiPackState> {
        let packs = self
            .packs()
            .iter()
            .map(DataPack::to_state)
            .collect::<PackResult<Vec<_>>>()?;
        let entries: Vec<Entry> = self.entries().cloned().collect();
        check_relations(self, &entries)?;
        Ok(MultiPackState {
            packs,
            entries,
            next_id: self.reserved_id(),
        })
    }

    /// Rebuild a multi-pack from a snapshot.
    ///
    /// Sub-packs are restored first, each with the multi-pack's registry and
    /// config, then the cross-document relations are re-installed against them.
    pub fn from_state(
        state: MultiPackState,
        registry: Arc<SchemaRegistry>,
        config: PackConfig,
    ) -> PackResult<Self> {
        let mut multi = MultiPack::with_config(registry.clone(), config.clone());
        for pack in state.packs {
            multi.add_pack(DataPack::from_state(pack, registry.clone(), config.clone())?);
        }
        let mut pending = Vec::new();
        for entry in state.entries {
            let id = entry.id();
            pending.push((id, multi.restore_entry(entry)?));
        }
        for (id, relations) in pending {
            install(id, relations, |id, role, address| match role {
                Role::Member => multi.add_members(id, [address]).map(drop),
                _ => multi.set_endpoint(id, role, address),
            })?;
        }
        multi.resume_ids(state.next_id);
        tracing::debug!(
            multi_pack = %multi.pack_id(),
            packs = multi.num_packs(),
            entries = multi.len(),
            "restored multi-pack"
        );
        Ok(multi)
    }

    pub fn to_ron(&self) -> PackResult<String> {
        self.to_state()?.to_ron()
    }

    pub fn from_ron(
        source: &str,
        registry: Arc<SchemaRegistry>,
        config: PackConfig,
    ) -> PackResult<Self> {
        Self::from_state(MultiPackState::from_ron(source)?, registry, config)
    }
}

fn install<A>(
    id: EntryId,
    relations: Vec<(Role, A)>,
    mut apply: impl FnMut(EntryId, Role, A) -> PackResult<()>,
) -> PackResult<()> {
    for (role, address) in relations {
        apply(id, role, address)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryContainer, EntryTypeDecl, FieldType, NewEntry, SubEntry};

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new()
            .with(EntryTypeDecl::annotation("Token").field("pos", FieldType::Str))
            .and_then(|r| r.with(EntryTypeDecl::annotation("Sentence")))
            .and_then(|r| r.with(EntryTypeDecl::link("Dependency", "Token", "Token")))
            .and_then(|r| r.with(EntryTypeDecl::group("Chain", "Token")))
            .and_then(|r| {
                r.with(EntryTypeDecl::multi_pack_link(
                    "Alignment",
                    "Sentence",
                    "Sentence",
                ))
            })
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_pack_round_trip() {
        let mut pack = DataPack::new("dogs bark", registry());
        let dogs = pack
            .create_entry(NewEntry::annotation("Token", 0, 4).field("pos", "NNS").creator("tagger"))
            .unwrap();
        let bark = pack.create_entry(NewEntry::annotation("Token", 5, 9)).unwrap();
        let dep = pack
            .create_entry(NewEntry::link("Dependency").parent(bark).child(dogs))
            .unwrap();
        let chain = pack.create_entry(NewEntry::group("Chain").members([dogs, bark])).unwrap();
        pack.set_fields(bark, [("pos", "VBP")]).unwrap();

        let source = pack.to_ron().unwrap();
        let restored = DataPack::from_ron(&source, registry(), PackConfig::default()).unwrap();

        assert_eq!(restored.text(), "dogs bark");
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.get_parent(dep).unwrap().id(), bark);
        assert_eq!(restored.get_members(chain).unwrap().len(), 2);

        let bark_entry = restored.get_entry(bark).unwrap();
        assert_eq!(bark_entry.modified_fields().collect::<Vec<_>>(), vec!["pos"]);
        assert_eq!(restored.get_entry(dogs).unwrap().creator(), Some("tagger"));
        for entry in pack.entries() {
            assert_eq!(restored.get_entry(entry.id()).unwrap(), entry);
        }
    }

    fn load(state: PackState) -> PackResult<DataPack> {
        DataPack::from_state(state, registry(), PackConfig::default())
    }

    #[test]
    fn test_restored_ids_continue() {
        let mut pack = DataPack::new("a b", registry());
        pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let last = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();

        let mut restored = load(pack.to_state().unwrap()).unwrap();
        let next = restored.create_entry(NewEntry::annotation("Sentence", 0, 3)).unwrap();
        assert!(next > last);
    }

    #[test]
    fn test_removed_ids_stay_retired() {
        let mut pack = DataPack::new("a b", registry());
        pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let last = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        pack.remove_entry(last).unwrap();

        let source = pack.to_ron().unwrap();
        let mut restored = DataPack::from_ron(&source, registry(), PackConfig::default()).unwrap();
        let next = restored.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        assert!(next > last);
    }

    #[test]
    fn test_missing_next_id_falls_back_to_largest() {
        let mut pack = DataPack::new("a b", registry());
        pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let last = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.next_id = EntryId::default();
        let mut restored = load(state).unwrap();
        let next = restored.create_entry(NewEntry::annotation("Token", 0, 3)).unwrap();
        assert_eq!(next, EntryId::new(last.get() + 1));
    }

    #[test]
    fn test_load_rejects_last_id() {
        let mut pack = DataPack::new("a b", registry());
        pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.entries[0].id = EntryId::new(u64::MAX);
        assert!(matches!(load(state), Err(PackError::Serialization(_))));
    }

    #[test]
    fn test_load_rejects_duplicate_id() {
        let mut pack = DataPack::new("a b", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.entries[1].id = a;
        assert!(matches!(load(state), Err(PackError::SchemaViolation { .. })));
    }

    #[test]
    fn test_save_rejects_dangling_relation() {
        let mut pack = DataPack::new("a b", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let b = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        let chain = pack.create_entry(NewEntry::group("Chain").members([a, b])).unwrap();
        pack.remove_entry(b).unwrap();

        let err = pack.to_ron().unwrap_err();
        assert!(matches!(err, PackError::DanglingReference { id, .. } if id == chain));

        pack.clear_members(chain).unwrap();
        assert!(pack.to_ron().is_ok());
    }

    #[test]
    fn test_load_rejects_dangling_endpoint() {
        let mut pack = DataPack::new("a b", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let b = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        pack.create_entry(NewEntry::link("Dependency").parent(a).child(b)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.entries.retain(|entry| entry.id() != b);
        let err = load(state).unwrap_err();
        assert!(matches!(err, PackError::UnknownId { id, .. } if id == b));
    }

    #[test]
    fn test_load_rechecks_types() {
        let mut pack = DataPack::new("a b", registry());
        let a = pack.create_entry(NewEntry::annotation("Token", 0, 1)).unwrap();
        let b = pack.create_entry(NewEntry::annotation("Token", 2, 3)).unwrap();
        pack.create_entry(NewEntry::link("Dependency").parent(a).child(b)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.entries[1].type_name = "Sentence".to_string();
        state.entries[1].fields.clear();
        let err = load(state).unwrap_err();
        assert!(matches!(err, PackError::TypeMismatch { role: Role::Child, .. }));
    }

    #[test]
    fn test_load_rejects_span_outside_text() {
        let mut pack = DataPack::new("a b", registry());
        pack.create_entry(NewEntry::annotation("Token", 0, 3)).unwrap();

        let mut state = pack.to_state().unwrap();
        state.text = "a".to_string();
        assert!(matches!(load(state), Err(PackError::SpanOutOfBounds { .. })));
    }

    #[test]
    fn test_multi_pack_round_trip() {
        let registry = registry();
        let mut en = DataPack::new("Hi.", registry.clone());
        let mut fr = DataPack::new("Salut.", registry.clone());
        let hi = en.create_entry(NewEntry::annotation("Sentence", 0, 3)).unwrap();
        let salut = fr.create_entry(NewEntry::annotation("Sentence", 0, 6)).unwrap();
        let mut multi = MultiPack::new(registry.clone());
        let en = multi.add_pack(en);
        let fr = multi.add_pack(fr);
        let link = multi
            .create_entry(
                NewEntry::link("Alignment")
                    .parent(SubEntry::new(en, hi))
                    .child(SubEntry::new(fr, salut)),
            )
            .unwrap();

        let source = multi.to_ron().unwrap();
        let restored = MultiPack::from_ron(&source, registry, PackConfig::default()).unwrap();
        assert_eq!(restored.num_packs(), 2);
        let child = restored.get_child(link).unwrap();
        assert_eq!(restored.pack(fr).unwrap().text_of(child).unwrap(), "Salut.");
    }

    #[test]
    fn test_multi_pack_save_rejects_dangling_sub_entry() {
        let registry = registry();
        let mut en = DataPack::new("Hi.", registry.clone());
        let hi = en.create_entry(NewEntry::annotation("Sentence", 0, 3)).unwrap();
        let mut multi = MultiPack::new(registry);
        let en = multi.add_pack(en);
        let hi = SubEntry::new(en, hi);
        let link = multi
            .create_entry(NewEntry::link("Alignment").parent(hi).child(hi))
            .unwrap();
        multi.pack_mut(en).unwrap().remove_entry(hi.entry_id()).unwrap();

        let err = multi.to_state().unwrap_err();
        assert!(matches!(err, PackError::DanglingReference { id, .. } if id == link));
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        assert!(matches!(
            DataPack::from_ron("not ron", registry(), PackConfig::default()),
            Err(PackError::Serialization(_))
        ));
    }
}
