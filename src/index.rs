//! Index bookkeeping for one store.
//!
//! ## Design
//!
//! The id map is the authoritative arena: every entry of a store lives in
//! it, keyed by [`EntryId`]. Alongside it:
//!
//! - a type index and a creator index, always maintained;
//! - three optional secondary indices that can be switched on and off:
//!
//! ```text
//! spans:   (Span, EntryId) ordered set         annotations in span order
//! links:   parent address -> {link ids}        "which links leave X?"
//!          child address  -> {link ids}        "which links enter X?"
//! groups:  member address -> {group ids}       "which groups hold X?"
//! ```
//!
//! Switching an index on rebuilds it from the id map in O(n); switching it
//! off drops it. Queries that would use a disabled index scan the id map
//! instead and return the same ids in the same order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{Address, Entry, EntryBody, EntryId, IndexConfig, Role, Span};

/// Endpoint → link adjacency, both directions.
#[derive(Debug)]
struct LinkAdjacency<A> {
    from_parent: BTreeMap<A, BTreeSet<EntryId>>,
    to_child: BTreeMap<A, BTreeSet<EntryId>>,
}

impl<A: Address> LinkAdjacency<A> {
    fn side(&mut self, role: Role) -> Option<&mut BTreeMap<A, BTreeSet<EntryId>>> {
        match role {
            Role::Parent => Some(&mut self.from_parent),
            Role::Child => Some(&mut self.to_child),
            Role::Member => None,
        }
    }

    fn add(&mut self, role: Role, address: A, link: EntryId) {
        if let Some(side) = self.side(role) {
            side.entry(address).or_default().insert(link);
        }
    }

    fn drop_edge(&mut self, role: Role, address: &A, link: EntryId) {
        if let Some(side) = self.side(role) {
            remove_addressed(side, address, link);
        }
    }
}

/// All index structures of one store, over relation addresses of type `A`.
#[derive(Debug)]
pub(crate) struct PackIndex<A: Address> {
    entries: BTreeMap<EntryId, Entry>,
    by_type: HashMap<String, BTreeSet<EntryId>>,
    by_creator: HashMap<String, BTreeSet<EntryId>>,
    spans: Option<BTreeSet<(Span, EntryId)>>,
    links: Option<LinkAdjacency<A>>,
    groups: Option<BTreeMap<A, BTreeSet<EntryId>>>,
}

impl<A: Address> PackIndex<A> {
    pub(crate) fn new(config: IndexConfig) -> Self {
        let mut index = Self {
            entries: BTreeMap::new(),
            by_type: HashMap::new(),
            by_creator: HashMap::new(),
            spans: None,
            links: None,
            groups: None,
        };
        index.set_config(config);
        index
    }

    pub(crate) fn config(&self) -> IndexConfig {
        IndexConfig {
            span: self.spans.is_some(),
            links: self.links.is_some(),
            groups: self.groups.is_some(),
        }
    }

    /// Build the indices turned on by `config` and drop the others.
    pub(crate) fn set_config(&mut self, config: IndexConfig) {
        let current = self.config();

        if config.span != current.span {
            self.spans = config.span.then(|| {
                self.entries
                    .values()
                    .filter_map(|entry| entry.span().map(|span| (span, entry.id)))
                    .collect()
            });
        }

        if config.links != current.links {
            self.links = config.links.then(|| {
                let mut adjacency = LinkAdjacency {
                    from_parent: BTreeMap::new(),
                    to_child: BTreeMap::new(),
                };
                for entry in self.entries.values() {
                    if let Some(link) = A::link_of(&entry.body) {
                        for (role, address) in link.endpoints() {
                            adjacency.add(role, address, entry.id);
                        }
                    }
                }
                adjacency
            });
        }

        if config.groups != current.groups {
            self.groups = config.groups.then(|| {
                let mut membership: BTreeMap<A, BTreeSet<EntryId>> = BTreeMap::new();
                for entry in self.entries.values() {
                    if let Some(group) = A::group_of(&entry.body) {
                        for member in group.members() {
                            membership.entry(member).or_default().insert(entry.id);
                        }
                    }
                }
                membership
            });
        }

        tracing::debug!(?config, entries = self.entries.len(), "index configuration changed");
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Mutable access for field updates. The body must not be changed
    /// through this reference; use the dedicated methods so indices follow.
    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Entries in id order, which is insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub(crate) fn insert(&mut self, entry: Entry) {
        let id = entry.id;
        self.by_type
            .entry(entry.type_name.clone())
            .or_default()
            .insert(id);
        if let Some(creator) = &entry.creator {
            self.by_creator.entry(creator.clone()).or_default().insert(id);
        }
        if let (Some(spans), Some(span)) = (self.spans.as_mut(), entry.span()) {
            spans.insert((span, id));
        }
        if let (Some(adjacency), Some(link)) = (self.links.as_mut(), A::link_of(&entry.body)) {
            for (role, address) in link.endpoints() {
                adjacency.add(role, address, id);
            }
        }
        if let (Some(membership), Some(group)) = (self.groups.as_mut(), A::group_of(&entry.body)) {
            for member in group.members() {
                membership.entry(member).or_default().insert(id);
            }
        }
        tracing::trace!(%id, type_name = %entry.type_name, "indexed entry");
        self.entries.insert(id, entry);
    }

    /// Drop an entry from every index at once.
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        remove_from(&mut self.by_type, &entry.type_name, id);
        if let Some(creator) = &entry.creator {
            remove_from(&mut self.by_creator, creator, id);
        }
        if let (Some(spans), Some(span)) = (self.spans.as_mut(), entry.span()) {
            spans.remove(&(span, id));
        }
        if let (Some(adjacency), Some(link)) = (self.links.as_mut(), A::link_of(&entry.body)) {
            for (role, address) in link.endpoints() {
                adjacency.drop_edge(role, &address, id);
            }
        }
        if let (Some(membership), Some(group)) = (self.groups.as_mut(), A::group_of(&entry.body)) {
            for member in group.members() {
                remove_addressed(membership, &member, id);
            }
        }
        tracing::trace!(%id, "unindexed entry");
        Some(entry)
    }

    /// Replace an annotation's span, returning the old one.
    pub(crate) fn replace_span(&mut self, id: EntryId, span: Span) -> Option<Span> {
        let entry = self.entries.get_mut(&id)?;
        let old = match &mut entry.body {
            EntryBody::Annotation(current) => std::mem::replace(current, span),
            _ => return None,
        };
        if let Some(spans) = self.spans.as_mut() {
            spans.remove(&(old, id));
            spans.insert((span, id));
        }
        Some(old)
    }

    /// Install a link endpoint, returning the address it replaced.
    pub(crate) fn set_endpoint(&mut self, link_id: EntryId, role: Role, address: A) -> Option<A> {
        let link = self
            .entries
            .get_mut(&link_id)
            .and_then(|entry| A::link_of_mut(&mut entry.body))?;
        let old = link.set(role, address);
        if let Some(adjacency) = self.links.as_mut() {
            if let Some(old) = old {
                adjacency.drop_edge(role, &old, link_id);
            }
            adjacency.add(role, address, link_id);
        }
        old
    }

    /// Add members to a group; returns how many were new.
    pub(crate) fn insert_members(&mut self, group_id: EntryId, members: &[A]) -> usize {
        let group = match self
            .entries
            .get_mut(&group_id)
            .and_then(|entry| A::group_of_mut(&mut entry.body))
        {
            Some(group) => group,
            None => return 0,
        };
        let mut added = 0;
        for member in members {
            if group.insert(*member) {
                added += 1;
                if let Some(membership) = self.groups.as_mut() {
                    membership.entry(*member).or_default().insert(group_id);
                }
            }
        }
        added
    }

    pub(crate) fn clear_members(&mut self, group_id: EntryId) -> usize {
        let old = match self
            .entries
            .get_mut(&group_id)
            .and_then(|entry| A::group_of_mut(&mut entry.body))
        {
            Some(group) => group.clear(),
            None => return 0,
        };
        if let Some(membership) = self.groups.as_mut() {
            for member in &old {
                remove_addressed(membership, member, group_id);
            }
        }
        old.len()
    }

    /// Type names that currently have at least one entry.
    pub(crate) fn present_types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }

    pub(crate) fn ids_by_creator(&self, creator: &str) -> impl Iterator<Item = EntryId> + '_ {
        self.by_creator
            .get(creator)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Annotations with `begin >= from`, in span order, when the span index is live.
    pub(crate) fn spans_from(
        &self,
        from: usize,
    ) -> Option<impl Iterator<Item = (Span, EntryId)> + '_> {
        let spans = self.spans.as_ref()?;
        Some(
            spans
                .range((Span::point(from), EntryId::new(0))..)
                .copied(),
        )
    }

    /// Links whose `role` endpoint is `address`, in id order.
    pub(crate) fn links_with(&self, role: Role, address: A) -> Vec<EntryId> {
        if let Some(adjacency) = &self.links {
            let side = match role {
                Role::Parent => &adjacency.from_parent,
                Role::Child => &adjacency.to_child,
                Role::Member => return Vec::new(),
            };
            return side
                .get(&address)
                .map(|links| links.iter().copied().collect())
                .unwrap_or_default();
        }
        self.entries
            .values()
            .filter(|entry| {
                A::link_of(&entry.body).map_or(false, |link| link.endpoint(role) == Some(address))
            })
            .map(|entry| entry.id)
            .collect()
    }

    /// Groups holding `address`, in id order.
    pub(crate) fn groups_with(&self, address: A) -> Vec<EntryId> {
        if let Some(membership) = &self.groups {
            return membership
                .get(&address)
                .map(|groups| groups.iter().copied().collect())
                .unwrap_or_default();
        }
        self.entries
            .values()
            .filter(|entry| {
                A::group_of(&entry.body).map_or(false, |group| group.contains(&address))
            })
            .map(|entry| entry.id)
            .collect()
    }
}

/// Remove `id` from the set under `key`, dropping the key once empty.
fn remove_from<K, Q>(map: &mut HashMap<K, BTreeSet<EntryId>>, key: &Q, id: EntryId)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(ids) = map.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

/// [`remove_from`] for address-keyed maps.
fn remove_addressed<A: Ord>(map: &mut BTreeMap<A, BTreeSet<EntryId>>, key: &A, id: EntryId) {
    if let Some(ids) = map.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}
