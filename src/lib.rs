#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! A typed, in-memory annotation store for text documents.
//!
//! Entries (span annotations, links and groups) live in the store that
//! created them and are addressed by opaque [`EntryId`]s. Relations hold
//! addresses only, so nothing points back at its owner and a relation to a
//! removed entry fails to resolve instead of dangling silently.
//!
//! ## Core Types
//!
//! - [`Span`] - Immutable half-open interval, ordered by `(begin, end)`
//! - [`Entry`] - One annotation, link or group, with its id and owner
//! - [`BaseLink`] / [`BaseGroup`] - Relation bodies over [`EntryId`] or [`SubEntry`] addresses
//! - [`SchemaRegistry`] - Declared entry types, supertypes and relation capabilities
//! - [`DataPack`] - One document and its entries
//! - [`MultiPack`] - Several documents plus cross-document links and groups
//! - [`PackDisplay`] - Text rendering of a pack's annotations and links
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use layered_pack::{
//!     DataPack, EntryContainer, EntryTypeDecl, NewEntry, PackError, SchemaRegistry,
//! };
//!
//! let registry = SchemaRegistry::new()
//!     .with(EntryTypeDecl::annotation("Token"))
//!     .and_then(|r| r.with(EntryTypeDecl::annotation("Sentence")))
//!     .and_then(|r| r.with(EntryTypeDecl::link("SentenceLink", "Sentence", "Sentence")))
//!     .unwrap();
//! let mut pack = DataPack::new("It rains. We stay.", Arc::new(registry));
//!
//! let first = pack.create_entry(NewEntry::annotation("Sentence", 0, 9)).unwrap();
//! let second = pack.create_entry(NewEntry::annotation("Sentence", 10, 18)).unwrap();
//! let token = pack.create_entry(NewEntry::annotation("Token", 0, 2)).unwrap();
//! let link = pack.create_entry(NewEntry::link("SentenceLink")).unwrap();
//!
//! assert!(matches!(
//!     pack.set_parent(link, token),
//!     Err(PackError::TypeMismatch { .. })
//! ));
//! pack.set_parent(link, first).unwrap();
//! pack.set_child(link, second).unwrap();
//! assert_eq!(pack.text_of(pack.get_child(link).unwrap()).unwrap(), "We stay.");
//! ```

mod config;
mod display;
mod entry;
mod error;
mod index;
mod multi_pack;
mod pack;
mod schema;
mod serial;
mod span;
mod store;
mod sub_entry;

pub use config::{IndexConfig, PackConfig};
pub use display::PackDisplay;
pub use entry::{
    Address, BaseGroup, BaseLink, Entry, EntryArgs, EntryBody, EntryId, Group, Link,
    MultiPackGroup, MultiPackLink, NewEntry, PackId,
};
pub use error::{PackError, PackResult, Role};
pub use multi_pack::MultiPack;
pub use pack::{DataPack, EntryContainer};
pub use schema::{
    EntryKind, EntryTypeDecl, FieldDecl, FieldType, FieldValue, SchemaRegistry, ENTRY,
};
pub use serial::{MultiPackState, PackState};
pub use span::Span;
pub use sub_entry::SubEntry;

#[cfg(test)]
mod tests {
    mod cross_document;
    mod index_toggle;
    mod relations;
}
