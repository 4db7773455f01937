use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{EntryId, SubEntry};

/// An unordered relation over a set of member addresses.
///
/// Membership is a set: adding an address twice is a no-op, and iteration
/// order is the address order, not insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseGroup<A: Ord> {
    members: BTreeSet<A>,
}

/// Group of entries from one pack.
pub type Group = BaseGroup<EntryId>;

/// Group of entries spread over the sub-packs of a multi-pack.
pub type MultiPackGroup = BaseGroup<SubEntry>;

impl<A: Ord> Default for BaseGroup<A> {
    fn default() -> Self {
        Self {
            members: BTreeSet::new(),
        }
    }
}

impl<A: Ord + Copy> BaseGroup<A> {
    /// Member addresses. To get the member entries, ask the owning pack.
    pub fn members(&self) -> impl Iterator<Item = A> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, address: &A) -> bool {
        self.members.contains(address)
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if the address was not already a member.
    pub(crate) fn insert(&mut self, address: A) -> bool {
        self.members.insert(address)
    }

    pub(crate) fn clear(&mut self) -> BTreeSet<A> {
        std::mem::take(&mut self.members)
    }
}
