//! Error types for the annotation store.
//!
//! Every variant carries the offending id and/or type name so a caller can
//! log or recover without re-deriving context. Errors are raised at the point
//! of violation and never degraded to a default value.

use thiserror::Error;

use crate::{EntryId, PackId, Span};

/// The position an entry occupies inside a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    /// Source endpoint of a link
    Parent,
    /// Target endpoint of a link
    Child,
    /// Member of a group
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Parent => "parent",
            Role::Child => "child",
            Role::Member => "member",
        })
    }
}

/// Errors raised by packs, multi-packs and the schema registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackError {
    /// A relation endpoint or group member failed its declared capability check.
    #[error("{role} of {entry_type} {id} must be an instance of `{expected}`, got `{actual}`")]
    TypeMismatch {
        id: EntryId,
        entry_type: String,
        role: Role,
        expected: String,
        actual: String,
    },

    /// The id is not present in the addressed store's index.
    #[error("no entry with id {id} in pack {pack}")]
    UnknownId { pack: PackId, id: EntryId },

    /// A sub-pack index is past the end of a multi-pack.
    #[error("pack index {pack_index} out of range for multi-pack of {len} packs")]
    IndexOutOfRange { pack_index: usize, len: usize },

    /// An operation that needs an owner was invoked on an unattached entry.
    #[error("{entry_type} {id} is not attached to any pack")]
    OrphanEntry { id: EntryId, entry_type: String },

    /// A stored endpoint or member no longer resolves.
    #[error("{entry_type} {id} refers to {target}, which does not resolve")]
    DanglingReference {
        id: EntryId,
        entry_type: String,
        target: String,
    },

    /// Constructor arguments or fields do not match the type declaration.
    #[error("schema violation for `{entry_type}`: {reason}")]
    SchemaViolation { entry_type: String, reason: String },

    /// Span bounds are inverted.
    #[error("invalid span: end {end} is before begin {begin}")]
    InvalidSpan { begin: usize, end: usize },

    /// A span does not address a valid slice of the pack's text.
    #[error("span {span} of entry {id} is outside the text (length {text_len})")]
    SpanOutOfBounds {
        id: EntryId,
        span: Span,
        text_len: usize,
    },

    /// A relation endpoint was read before being set.
    #[error("{role} of {entry_type} {id} is not set")]
    IncompleteEntry {
        id: EntryId,
        entry_type: String,
        role: Role,
    },

    /// The entry is owned by a different store than the one validating it.
    #[error("entry {id} belongs to pack {actual}, not pack {expected}")]
    OwnerMismatch {
        id: EntryId,
        expected: PackId,
        actual: PackId,
    },

    /// Persisted state could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl PackError {
    pub(crate) fn schema(entry_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            entry_type: entry_type.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for pack operations.
pub type PackResult<T> = Result<T, PackError>;
