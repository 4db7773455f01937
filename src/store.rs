//! The entry store shared by single- and multi-document containers.
//!
//! `EntryStore` is the sole authority for id assignment, validation and
//! index consistency. Containers resolve relation targets (in their own
//! store, or in a sub-pack) and hand the resolved type names in, so every
//! capability check happens here against the registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::index::PackIndex;
use crate::{
    Address, BaseGroup, BaseLink, Entry, EntryArgs, EntryBody, EntryId, EntryKind, FieldValue,
    IndexConfig, NewEntry, PackConfig, PackError, PackId, PackResult, Role, SchemaRegistry, Span,
};

/// Who wrote which fields of a type.
#[derive(Debug, Clone, Default)]
struct Provenance {
    default_creator: Option<String>,
    fields_created: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug)]
pub(crate) struct EntryStore<A: Address> {
    pack_id: PackId,
    registry: Arc<SchemaRegistry>,
    fallback_creator: Option<String>,
    next_id: u64,
    index: PackIndex<A>,
    provenance: BTreeMap<String, Provenance>,
}

impl<A: Address> EntryStore<A> {
    pub(crate) fn new(registry: Arc<SchemaRegistry>, config: &PackConfig) -> Self {
        Self {
            pack_id: PackId::fresh(),
            registry,
            fallback_creator: config.default_creator.clone(),
            next_id: 0,
            index: PackIndex::new(config.indexes),
            provenance: BTreeMap::new(),
        }
    }

    pub(crate) fn pack_id(&self) -> PackId {
        self.pack_id
    }

    pub(crate) fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub(crate) fn config(&self) -> PackConfig {
        PackConfig {
            indexes: self.index.config(),
            default_creator: self.fallback_creator.clone(),
        }
    }

    pub(crate) fn set_index_config(&mut self, config: IndexConfig) {
        self.index.set_config(config);
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// The id the next successful creation will receive.
    pub(crate) fn reserved_id(&self) -> EntryId {
        EntryId::new(self.next_id)
    }

    /// Never hand out ids below `next`, e.g. ids of entries removed before a save.
    pub(crate) fn resume_ids(&mut self, next: EntryId) {
        self.next_id = self.next_id.max(next.get());
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.index.iter()
    }

    pub(crate) fn get(&self, id: EntryId) -> PackResult<&Entry> {
        self.index.get(id).ok_or(PackError::UnknownId {
            pack: self.pack_id,
            id,
        })
    }

    fn check_kind(&self, type_name: &str, kind: EntryKind) -> PackResult<()> {
        let declared = self.registry.instantiable(type_name)?;
        if declared != kind {
            return Err(PackError::schema(
                type_name,
                format!("a {:?} type cannot be built as a {:?}", declared, kind),
            ));
        }
        let in_scope = kind == A::LINK_KIND
            || kind == A::GROUP_KIND
            || (kind == EntryKind::Annotation && A::HOLDS_ANNOTATIONS);
        if !in_scope {
            return Err(PackError::schema(
                type_name,
                format!("{:?} entries do not belong in this store", kind),
            ));
        }
        Ok(())
    }

    fn check_field(&self, type_name: &str, name: &str, value: &FieldValue) -> PackResult<()> {
        let decl = self
            .registry
            .field(type_name, name)
            .ok_or_else(|| PackError::schema(type_name, format!("unknown field `{}`", name)))?;
        if !value.conforms_to(decl.ty) {
            return Err(PackError::schema(
                type_name,
                format!("field `{}` expects a {}, got {}", name, decl.ty, value),
            ));
        }
        Ok(())
    }

    fn check_capability(
        &self,
        id: EntryId,
        entry_type: &str,
        role: Role,
        actual: &str,
    ) -> PackResult<()> {
        let expected = match role {
            Role::Parent => self.registry.parent_capability(entry_type),
            Role::Child => self.registry.child_capability(entry_type),
            Role::Member => self.registry.member_capability(entry_type),
        };
        if self.registry.is_instance(actual, expected) {
            Ok(())
        } else {
            Err(PackError::TypeMismatch {
                id,
                entry_type: entry_type.to_string(),
                role,
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Check that `entry` is owned by this store and matches its declaration.
    pub(crate) fn validate(&self, entry: &Entry) -> PackResult<()> {
        match entry.owner {
            None => {
                return Err(PackError::OrphanEntry {
                    id: entry.id,
                    entry_type: entry.type_name.clone(),
                })
            }
            Some(owner) if owner != self.pack_id => {
                return Err(PackError::OwnerMismatch {
                    id: entry.id,
                    expected: self.pack_id,
                    actual: owner,
                })
            }
            Some(_) => {}
        }
        self.check_kind(&entry.type_name, entry.kind())?;
        for (name, value) in &entry.fields {
            self.check_field(&entry.type_name, name, value)?;
        }
        Ok(())
    }

    /// Build, validate and index a new entry.
    ///
    /// `targets` maps every endpoint or member address in `new` to the type
    /// name of the entry it resolves to. The id is only consumed on success.
    pub(crate) fn create(
        &mut self,
        new: NewEntry<A>,
        targets: &BTreeMap<A, String>,
    ) -> PackResult<EntryId> {
        let NewEntry {
            type_name,
            creator,
            fields: values,
            args,
        } = new;
        let id = self.reserved_id();
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| PackError::schema(&type_name, "entry ids are exhausted"))?;
        let kind = match &args {
            EntryArgs::Annotation { .. } => EntryKind::Annotation,
            EntryArgs::Link { .. } => A::LINK_KIND,
            EntryArgs::Group { .. } => A::GROUP_KIND,
        };
        self.check_kind(&type_name, kind)?;

        let mut fields: BTreeMap<String, FieldValue> = self
            .registry
            .fields(&type_name)
            .map(|decl| (decl.name.clone(), decl.default.clone()))
            .collect();
        for (name, value) in values {
            self.check_field(&type_name, &name, &value)?;
            fields.insert(name, value);
        }

        let target_type = |address: A| {
            targets
                .get(&address)
                .map(String::as_str)
                .ok_or_else(|| PackError::DanglingReference {
                    id,
                    entry_type: type_name.clone(),
                    target: address.to_string(),
                })
        };
        let body = match args {
            EntryArgs::Annotation { begin, end } => EntryBody::Annotation(Span::new(begin, end)?),
            EntryArgs::Link { parent, child } => {
                let mut link = BaseLink::default();
                for (role, address) in [(Role::Parent, parent), (Role::Child, child)] {
                    if let Some(address) = address {
                        self.check_capability(id, &type_name, role, target_type(address)?)?;
                        link.set(role, address);
                    }
                }
                A::link_body(link)
            }
            EntryArgs::Group { members } => {
                let mut group = BaseGroup::default();
                for address in members {
                    self.check_capability(id, &type_name, Role::Member, target_type(address)?)?;
                    group.insert(address);
                }
                A::group_body(group)
            }
        };

        let creator = creator
            .or_else(|| self.default_creator(&type_name).map(str::to_string))
            .or_else(|| self.fallback_creator.clone());
        let entry = Entry {
            id,
            type_name,
            owner: Some(self.pack_id),
            creator,
            fields,
            modified_fields: BTreeSet::new(),
            body,
        };
        self.validate(&entry)?;

        tracing::debug!(pack = %self.pack_id, %id, type_name = %entry.type_name, "created entry");
        self.index.insert(entry);
        self.next_id = next_id;
        Ok(id)
    }

    /// Install a link endpoint after checking it against the declared capability.
    pub(crate) fn set_endpoint(
        &mut self,
        link_id: EntryId,
        role: Role,
        address: A,
        target_type: &str,
    ) -> PackResult<Option<A>> {
        let link = self.get(link_id)?;
        if link.kind() != A::LINK_KIND {
            return Err(PackError::schema(
                &link.type_name,
                format!("entry {} is not a {:?}", link_id, A::LINK_KIND),
            ));
        }
        if role == Role::Member {
            return Err(PackError::schema(&link.type_name, "links have no member role"));
        }
        self.check_capability(link_id, &link.type_name, role, target_type)?;
        tracing::trace!(%link_id, %role, %address, "set endpoint");
        Ok(self.index.set_endpoint(link_id, role, address))
    }

    fn group_type(&self, group_id: EntryId) -> PackResult<&str> {
        let group = self.get(group_id)?;
        if group.kind() != A::GROUP_KIND {
            return Err(PackError::schema(
                &group.type_name,
                format!("entry {} is not a {:?}", group_id, A::GROUP_KIND),
            ));
        }
        Ok(&group.type_name)
    }

    /// Add members, each paired with its resolved type name.
    ///
    /// Every member is checked before any is added, so a failing call
    /// leaves the group untouched. Returns how many members were new.
    pub(crate) fn add_members(
        &mut self,
        group_id: EntryId,
        members: &[(A, String)],
    ) -> PackResult<usize> {
        let group_type = self.group_type(group_id)?;
        for (_, actual) in members {
            self.check_capability(group_id, group_type, Role::Member, actual)?;
        }
        let addresses: Vec<A> = members.iter().map(|(address, _)| *address).collect();
        let added = self.index.insert_members(group_id, &addresses);
        tracing::trace!(%group_id, added, "added members");
        Ok(added)
    }

    pub(crate) fn clear_members(&mut self, group_id: EntryId) -> PackResult<usize> {
        self.group_type(group_id)?;
        Ok(self.index.clear_members(group_id))
    }

    /// Drop an entry from every index and hand it back without an owner.
    pub(crate) fn remove(&mut self, id: EntryId) -> PackResult<Entry> {
        let mut entry = self.index.remove(id).ok_or(PackError::UnknownId {
            pack: self.pack_id,
            id,
        })?;
        entry.owner = None;
        tracing::debug!(pack = %self.pack_id, %id, type_name = %entry.type_name, "removed entry");
        Ok(entry)
    }

    /// Replace an annotation's span, returning the old one.
    pub(crate) fn set_span(&mut self, id: EntryId, span: Span) -> PackResult<Span> {
        let entry = self.get(id)?;
        if entry.span().is_none() {
            return Err(PackError::schema(
                &entry.type_name,
                format!("entry {} is not an annotation", id),
            ));
        }
        self.index.replace_span(id, span).ok_or(PackError::UnknownId {
            pack: self.pack_id,
            id,
        })
    }

    /// Write field values, recording their names as modified.
    ///
    /// All values are checked first; nothing is written if any fails.
    pub(crate) fn set_fields(
        &mut self,
        id: EntryId,
        values: Vec<(String, FieldValue)>,
    ) -> PackResult<()> {
        let entry = self.get(id)?;
        for (name, value) in &values {
            self.check_field(&entry.type_name, name, value)?;
        }
        let pack = self.pack_id;
        let entry = self
            .index
            .get_mut(id)
            .ok_or(PackError::UnknownId { pack, id })?;
        for (name, value) in values {
            entry.modified_fields.insert(name.clone());
            entry.fields.insert(name, value);
        }
        Ok(())
    }

    /// Record that `creator` produced `fields` on the types of `ids`.
    ///
    /// The first creator recorded for a type becomes its default creator.
    pub(crate) fn record_fields(
        &mut self,
        ids: &[EntryId],
        fields: &[&str],
        creator: &str,
    ) -> PackResult<()> {
        let mut types = BTreeSet::new();
        for id in ids {
            let entry = self.get(*id)?;
            for field in fields {
                if self.registry.field(&entry.type_name, field).is_none() {
                    return Err(PackError::schema(
                        &entry.type_name,
                        format!("unknown field `{}`", field),
                    ));
                }
            }
            types.insert(entry.type_name.clone());
        }
        for type_name in types {
            let record = self.provenance.entry(type_name).or_default();
            record
                .default_creator
                .get_or_insert_with(|| creator.to_string());
            record
                .fields_created
                .entry(creator.to_string())
                .or_default()
                .extend(fields.iter().map(|field| field.to_string()));
        }
        Ok(())
    }

    pub(crate) fn fields_created(
        &self,
        type_name: &str,
        creator: &str,
    ) -> impl Iterator<Item = &str> {
        self.provenance
            .get(type_name)
            .and_then(|record| record.fields_created.get(creator))
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub(crate) fn default_creator(&self, type_name: &str) -> Option<&str> {
        self.provenance
            .get(type_name)
            .and_then(|record| record.default_creator.as_deref())
    }

    /// Types with live entries that are `type_name` or extend it.
    fn matching_types(&self, type_name: &str) -> PackResult<BTreeSet<&str>> {
        self.registry.decl(type_name)?;
        Ok(self
            .index
            .present_types()
            .filter(|present| self.registry.is_instance(present, type_name))
            .collect())
    }

    /// Entries of `type_name` or any subtype.
    ///
    /// Annotation types come back in `(span, id)` order, restricted to
    /// spans inside `within` when given. Other kinds come back in id order
    /// and ignore `within`.
    pub(crate) fn query<'a>(
        &'a self,
        type_name: &str,
        within: Option<Span>,
    ) -> PackResult<Box<dyn Iterator<Item = &'a Entry> + 'a>> {
        let types = self.matching_types(type_name)?;
        if !self
            .registry
            .is_instance(type_name, EntryKind::Annotation.root_type())
        {
            return Ok(Box::new(
                self.index
                    .iter()
                    .filter(move |entry| types.contains(entry.type_name.as_str())),
            ));
        }

        let (from, to) = within.map_or((0, usize::MAX), |span| (span.begin(), span.end()));
        if let Some(spans) = self.index.spans_from(from) {
            return Ok(Box::new(
                spans
                    .take_while(move |(span, _)| span.begin() <= to)
                    .filter(move |(span, _)| span.end() <= to)
                    .filter_map(move |(_, id)| self.index.get(id))
                    .filter(move |entry| types.contains(entry.type_name.as_str())),
            ));
        }

        let mut entries: Vec<&Entry> = self
            .index
            .iter()
            .filter(|entry| types.contains(entry.type_name.as_str()))
            .filter(|entry| {
                entry
                    .span()
                    .map_or(false, |span| span.begin() >= from && span.end() <= to)
            })
            .collect();
        entries.sort_by_key(|entry| (entry.span(), entry.id));
        Ok(Box::new(entries.into_iter()))
    }

    fn filter_type<'a>(
        &'a self,
        ids: Vec<EntryId>,
        type_name: Option<&str>,
    ) -> PackResult<Vec<&'a Entry>> {
        if let Some(type_name) = type_name {
            self.registry.decl(type_name)?;
        }
        Ok(ids
            .into_iter()
            .filter_map(|id| self.index.get(id))
            .filter(|entry| {
                type_name.map_or(true, |t| self.registry.is_instance(&entry.type_name, t))
            })
            .collect())
    }

    /// Links whose `role` endpoint is `address`, optionally of one type.
    pub(crate) fn links_with(
        &self,
        role: Role,
        address: A,
        link_type: Option<&str>,
    ) -> PackResult<Vec<&Entry>> {
        self.filter_type(self.index.links_with(role, address), link_type)
    }

    /// Groups holding `address`, optionally of one type.
    pub(crate) fn groups_with(
        &self,
        address: A,
        group_type: Option<&str>,
    ) -> PackResult<Vec<&Entry>> {
        self.filter_type(self.index.groups_with(address), group_type)
    }

    pub(crate) fn by_creator<'a>(&'a self, creator: &str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.index
            .ids_by_creator(creator)
            .filter_map(move |id| self.index.get(id))
    }

    /// Insert a persisted entry without its relations.
    ///
    /// Returns the endpoints and members still to be installed through the
    /// checked setters, so stored state is held to the same rules as live
    /// input.
    pub(crate) fn restore(&mut self, mut entry: Entry) -> PackResult<Vec<(Role, A)>> {
        if self.index.contains(entry.id) {
            return Err(PackError::schema(
                &entry.type_name,
                format!("duplicate id {}", entry.id),
            ));
        }
        let next_id = entry.id.get().checked_add(1).ok_or_else(|| {
            PackError::Serialization(format!("entry id {} leaves no id for new entries", entry.id))
        })?;
        entry.owner = Some(self.pack_id);
        for decl in self.registry.fields(&entry.type_name) {
            entry
                .fields
                .entry(decl.name.clone())
                .or_insert_with(|| decl.default.clone());
        }
        self.validate(&entry)?;

        let mut pending = Vec::new();
        if let Some(link) = A::link_of(&entry.body) {
            pending.extend(link.endpoints());
            entry.body = A::link_body(BaseLink::default());
        } else if let Some(group) = A::group_of(&entry.body) {
            pending.extend(group.members().map(|member| (Role::Member, member)));
            entry.body = A::group_body(BaseGroup::default());
        }

        self.next_id = self.next_id.max(next_id);
        tracing::trace!(pack = %self.pack_id, id = %entry.id, "restored entry");
        self.index.insert(entry);
        Ok(pending)
    }
}
