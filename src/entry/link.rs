use serde::{Deserialize, Serialize};

use crate::{EntryId, Role, SubEntry};

/// A directed binary relation, holding its endpoints as addresses only.
///
/// `A` is [`EntryId`] for links inside one pack and [`SubEntry`] for links
/// spanning the sub-packs of a multi-pack. Endpoints are optional until set;
/// resolving them back to entries is a query against the owning store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseLink<A> {
    parent: Option<A>,
    child: Option<A>,
}

/// Link between two entries of the same pack.
pub type Link = BaseLink<EntryId>;

/// Link between entries of (possibly) different sub-packs.
pub type MultiPackLink = BaseLink<SubEntry>;

impl<A> Default for BaseLink<A> {
    fn default() -> Self {
        Self {
            parent: None,
            child: None,
        }
    }
}

impl<A: Copy> BaseLink<A> {
    /// Address of the parent endpoint, if set.
    pub fn parent(&self) -> Option<A> {
        self.parent
    }

    /// Address of the child endpoint, if set.
    pub fn child(&self) -> Option<A> {
        self.child
    }

    pub fn endpoint(&self, role: Role) -> Option<A> {
        match role {
            Role::Parent => self.parent,
            Role::Child => self.child,
            Role::Member => None,
        }
    }

    /// Both endpoints that are set, parent first.
    pub fn endpoints(&self) -> impl Iterator<Item = (Role, A)> {
        let parent = self.parent.map(|a| (Role::Parent, a));
        let child = self.child.map(|a| (Role::Child, a));
        parent.into_iter().chain(child)
    }

    /// Install an endpoint, returning the address it replaced.
    pub(crate) fn set(&mut self, role: Role, address: A) -> Option<A> {
        match role {
            Role::Parent => self.parent.replace(address),
            Role::Child => self.child.replace(address),
            Role::Member => None,
        }
    }
}
