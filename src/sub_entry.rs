//! Addresses of entries living inside one sub-pack of a multi-pack.

use serde::{Deserialize, Serialize};

use crate::{
    Address, BaseGroup, BaseLink, EntryBody, EntryId, EntryKind, MultiPack, MultiPackGroup,
    MultiPackLink, PackResult,
};

/// `(pack_index, entry_id)`: which sub-pack, then which entry inside it.
///
/// This is the addressing unit of cross-document relations. Equality,
/// ordering and hashing are structural on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubEntry {
    pack_index: usize,
    entry_id: EntryId,
}

impl SubEntry {
    /// Build an address without checking that it resolves.
    pub fn new(pack_index: usize, entry_id: EntryId) -> Self {
        Self {
            pack_index,
            entry_id,
        }
    }

    /// Build an address after checking it resolves inside `container`.
    ///
    /// Fails with `IndexOutOfRange` when `pack_index` has no sub-pack and
    /// `UnknownId` when that sub-pack has no entry `entry_id`.
    pub fn from_address(
        container: &MultiPack,
        pack_index: usize,
        entry_id: EntryId,
    ) -> PackResult<Self> {
        container.pack(pack_index)?.get_entry(entry_id)?;
        Ok(Self::new(pack_index, entry_id))
    }

    pub fn pack_index(&self) -> usize {
        self.pack_index
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn index_key(&self) -> (usize, EntryId) {
        (self.pack_index, self.entry_id)
    }
}

impl std::fmt::Display for SubEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pack_index, self.entry_id)
    }
}

impl Address for SubEntry {
    const LINK_KIND: EntryKind = EntryKind::MultiPackLink;
    const GROUP_KIND: EntryKind = EntryKind::MultiPackGroup;
    const HOLDS_ANNOTATIONS: bool = false;

    fn link_of(body: &EntryBody) -> Option<&MultiPackLink> {
        match body {
            EntryBody::MultiPackLink(link) => Some(link),
            _ => None,
        }
    }

    fn link_of_mut(body: &mut EntryBody) -> Option<&mut MultiPackLink> {
        match body {
            EntryBody::MultiPackLink(link) => Some(link),
            _ => None,
        }
    }

    fn group_of(body: &EntryBody) -> Option<&MultiPackGroup> {
        match body {
            EntryBody::MultiPackGroup(group) => Some(group),
            _ => None,
        }
    }

    fn group_of_mut(body: &mut EntryBody) -> Option<&mut MultiPackGroup> {
        match body {
            EntryBody::MultiPackGroup(group) => Some(group),
            _ => None,
        }
    }

    fn link_body(link: BaseLink<Self>) -> EntryBody {
        EntryBody::MultiPackLink(link)
    }

    fn group_body(group: BaseGroup<Self>) -> EntryBody {
        EntryBody::MultiPackGroup(group)
    }
}
