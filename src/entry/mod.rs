//! Entries: the unit of identity in a pack.
//!
//! An [`Entry`] owns no text. It carries an id assigned by the store that
//! created it, the id of that store (never a reference to it), a creator
//! label, its declared field values and a kind-specific [`EntryBody`].
//! Relations keep their endpoints and members as addresses; turning them
//! back into entries is always a lookup against the owning store.

mod group;
mod link;
mod new;

pub use group::{BaseGroup, Group, MultiPackGroup};
pub use link::{BaseLink, Link, MultiPackLink};
pub use new::{EntryArgs, NewEntry};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EntryKind, FieldValue, Span, SubEntry};

/// Opaque identifier of an entry, unique within its owning store.
///
/// Ids come from a single monotonic counter per store, so two entries of
/// the same store never share an id regardless of their types.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(EntryId)
    }
}

static NEXT_PACK_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a store (a pack or a multi-pack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackId(u64);

impl PackId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_PACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind-specific part of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryBody {
    Annotation(Span),
    Link(Link),
    Group(Group),
    MultiPackLink(MultiPackLink),
    MultiPackGroup(MultiPackGroup),
}

impl EntryBody {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryBody::Annotation(_) => EntryKind::Annotation,
            EntryBody::Link(_) => EntryKind::Link,
            EntryBody::Group(_) => EntryKind::Group,
            EntryBody::MultiPackLink(_) => EntryKind::MultiPackLink,
            EntryBody::MultiPackGroup(_) => EntryKind::MultiPackGroup,
        }
    }
}

/// An address type relations can point at.
///
/// Implemented by [`EntryId`] (same-pack relations) and [`SubEntry`]
/// (cross-pack relations); it tells a store which body variants carry
/// addresses of its kind.
pub trait Address:
    Copy + Ord + Hash + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const LINK_KIND: EntryKind;
    const GROUP_KIND: EntryKind;
    /// Whether a store addressed this way also holds span annotations.
    const HOLDS_ANNOTATIONS: bool;

    fn link_of(body: &EntryBody) -> Option<&BaseLink<Self>>;
    fn link_of_mut(body: &mut EntryBody) -> Option<&mut BaseLink<Self>>;
    fn group_of(body: &EntryBody) -> Option<&BaseGroup<Self>>;
    fn group_of_mut(body: &mut EntryBody) -> Option<&mut BaseGroup<Self>>;
    fn link_body(link: BaseLink<Self>) -> EntryBody;
    fn group_body(group: BaseGroup<Self>) -> EntryBody;
}

impl Address for EntryId {
    const LINK_KIND: EntryKind = EntryKind::Link;
    const GROUP_KIND: EntryKind = EntryKind::Group;
    const HOLDS_ANNOTATIONS: bool = true;

    fn link_of(body: &EntryBody) -> Option<&Link> {
        match body {
            EntryBody::Link(link) => Some(link),
            _ => None,
        }
    }

    fn link_of_mut(body: &mut EntryBody) -> Option<&mut Link> {
        match body {
            EntryBody::Link(link) => Some(link),
            _ => None,
        }
    }

    fn group_of(body: &EntryBody) -> Option<&Group> {
        match body {
            EntryBody::Group(group) => Some(group),
            _ => None,
        }
    }

    fn group_of_mut(body: &mut EntryBody) -> Option<&mut Group> {
        match body {
            EntryBody::Group(group) => Some(group),
            _ => None,
        }
    }

    fn link_body(link: Link) -> EntryBody {
        EntryBody::Link(link)
    }

    fn group_body(group: Group) -> EntryBody {
        EntryBody::Group(group)
    }
}

/// One entry of a pack: an annotation, link or group.
///
/// Equality and hashing are structural on the type name plus the body
/// (span bounds, endpoint addresses or member set). The id, owner, creator
/// and field values do not take part, so two annotations of the same type
/// over the same bounds compare equal even across packs; use ids when
/// store-scoped identity matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub(crate) id: EntryId,
    pub(crate) type_name: String,
    #[serde(skip)]
    pub(crate) owner: Option<PackId>,
    #[serde(default)]
    pub(crate) creator: Option<String>,
    #[serde(default)]
    pub(crate) fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub(crate) modified_fields: BTreeSet<String>,
    pub(crate) body: EntryBody,
}

impl Entry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The key a pack indexes this entry under.
    pub fn index_key(&self) -> EntryId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> EntryKind {
        self.body.kind()
    }

    /// The store that created this entry, or `None` once it has been removed.
    pub fn owner(&self) -> Option<PackId> {
        self.owner
    }

    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn body(&self) -> &EntryBody {
        &self.body
    }

    pub fn span(&self) -> Option<Span> {
        match &self.body {
            EntryBody::Annotation(span) => Some(*span),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        EntryId::link_of(&self.body)
    }

    pub fn as_group(&self) -> Option<&Group> {
        EntryId::group_of(&self.body)
    }

    pub fn as_multi_pack_link(&self) -> Option<&MultiPackLink> {
        SubEntry::link_of(&self.body)
    }

    pub fn as_multi_pack_group(&self) -> Option<&MultiPackGroup> {
        SubEntry::group_of(&self.body)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of fields written through `set_fields` since creation.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified_fields.iter().map(String::as_str)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.body == other.body
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.body.hash(state);
    }
}
