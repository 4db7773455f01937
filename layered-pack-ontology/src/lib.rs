#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! A ready-made ontology for layered-pack.
//!
//! [`base_ontology`] returns a fresh [`SchemaRegistry`] declaring the usual
//! linguistic layers. Nothing here is global: each caller gets its own
//! registry value and may extend it before handing it to a pack.
//!
//! ## Declared Types
//!
//! - **Annotations**: `Token`, `Document`, `Sentence`, `Utterance`,
//!   `EntityMention`, `PredicateMention`, `PredicateArgument`
//! - **Links**: `PredicateLink`, `Dependency`, `EnhancedDependency`, `RelationLink`
//! - **Groups**: `CoreferenceGroup`
//! - **Cross-document**: `CrossDocEntityRelation`, `CrossDocCoreferenceGroup`
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use layered_pack::{DataPack, EntryContainer, NewEntry};
//! use layered_pack_ontology::{base_ontology, types};
//!
//! let mut pack = DataPack::new("Dogs bark.", Arc::new(base_ontology().unwrap()));
//! let dogs = pack
//!     .create_entry(NewEntry::annotation(types::TOKEN, 0, 4).field("pos", "NNS"))
//!     .unwrap();
//! let bark = pack.create_entry(NewEntry::annotation(types::TOKEN, 5, 9)).unwrap();
//! let dep = pack
//!     .create_entry(
//!         NewEntry::link(types::DEPENDENCY)
//!             .parent(bark)
//!             .child(dogs)
//!             .field("dep_label", "nsubj"),
//!     )
//!     .unwrap();
//! assert_eq!(pack.text_of(pack.get_child(dep).unwrap()).unwrap(), "Dogs");
//! ```

pub mod types;

use layered_pack::{EntryTypeDecl, FieldDecl, FieldType, PackResult, SchemaRegistry};

use types::*;

fn annotations() -> Vec<EntryTypeDecl> {
    vec![
        EntryTypeDecl::annotation(TOKEN)
            .field("pos", FieldType::Str)
            .field("ud_xpos", FieldType::Str)
            .field("lemma", FieldType::Str)
            .field("ner", FieldType::Str)
            .field("sense", FieldType::Str)
            .with_field(FieldDecl::new("is_root", FieldType::Bool).with_default(false)),
        EntryTypeDecl::annotation(DOCUMENT),
        EntryTypeDecl::annotation(SENTENCE),
        EntryTypeDecl::annotation(UTTERANCE),
        EntryTypeDecl::annotation(ENTITY_MENTION).field("ner_type", FieldType::Str),
        EntryTypeDecl::annotation(PREDICATE_MENTION).field("ner_type", FieldType::Str),
        EntryTypeDecl::annotation(PREDICATE_ARGUMENT).field("ner_type", FieldType::Str),
    ]
}

fn relations() -> Vec<EntryTypeDecl> {
    vec![
        EntryTypeDecl::link(PREDICATE_LINK, PREDICATE_MENTION, PREDICATE_ARGUMENT)
            .field("arg_type", FieldType::Str),
        EntryTypeDecl::link(DEPENDENCY, TOKEN, TOKEN).field("dep_label", FieldType::Str),
        EntryTypeDecl::link(ENHANCED_DEPENDENCY, TOKEN, TOKEN).field("dep_label", FieldType::Str),
        EntryTypeDecl::link(RELATION_LINK, ENTITY_MENTION, ENTITY_MENTION)
            .field("rel_type", FieldType::Str),
        EntryTypeDecl::group(COREFERENCE_GROUP, ENTITY_MENTION),
        EntryTypeDecl::multi_pack_link(CROSS_DOC_ENTITY_RELATION, ENTITY_MENTION, ENTITY_MENTION)
            .field("rel_type", FieldType::Str),
        EntryTypeDecl::multi_pack_group(CROSS_DOC_COREFERENCE_GROUP, ENTITY_MENTION),
    ]
}

/// Register the base ontology into an existing registry.
///
/// Fails with `SchemaViolation` if any of the names is already taken.
pub fn register_base(registry: &mut SchemaRegistry) -> PackResult<()> {
    // annotations first: relations name them as capabilities
    for decl in annotations().into_iter().chain(relations()) {
        registry.register(decl)?;
    }
    Ok(())
}

/// A new registry holding the builtin roots plus the base ontology.
pub fn base_ontology() -> PackResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    register_base(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use layered_pack::{
        DataPack, EntryContainer, EntryKind, FieldValue, MultiPack, NewEntry, PackDisplay,
        PackError, SubEntry,
    };

    use super::*;

    #[test]
    fn test_kinds() {
        let registry = base_ontology().unwrap();
        assert_eq!(registry.kind_of(TOKEN).unwrap(), EntryKind::Annotation);
        assert_eq!(registry.kind_of(DEPENDENCY).unwrap(), EntryKind::Link);
        assert_eq!(registry.kind_of(COREFERENCE_GROUP).unwrap(), EntryKind::Group);
        assert_eq!(
            registry.kind_of(CROSS_DOC_ENTITY_RELATION).unwrap(),
            EntryKind::MultiPackLink
        );
        assert_eq!(
            registry.kind_of(CROSS_DOC_COREFERENCE_GROUP).unwrap(),
            EntryKind::MultiPackGroup
        );
        assert_eq!(registry.parent_capability(PREDICATE_LINK), PREDICATE_MENTION);
        assert_eq!(registry.child_capability(PREDICATE_LINK), PREDICATE_ARGUMENT);
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut registry = base_ontology().unwrap();
        assert!(matches!(
            register_base(&mut registry),
            Err(PackError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_extending_the_base() {
        let registry = base_ontology()
            .and_then(|r| r.with(EntryTypeDecl::new("PersonMention", ENTITY_MENTION)))
            .unwrap();
        let mut pack = DataPack::new("Ann and Bo.", Arc::new(registry));
        let ann = pack
            .create_entry(NewEntry::annotation("PersonMention", 0, 3).field("ner_type", "PER"))
            .unwrap();
        let bo = pack.create_entry(NewEntry::annotation("PersonMention", 8, 10)).unwrap();
        let group = pack
            .create_entry(NewEntry::group(COREFERENCE_GROUP).members([ann, bo]))
            .unwrap();
        assert_eq!(pack.num_members(group).unwrap(), 2);
        assert_eq!(
            pack.get_entry(ann).unwrap().field("ner_type"),
            Some(&FieldValue::from("PER"))
        );
    }

    #[test]
    fn test_token_defaults() {
        let mut pack = DataPack::new("run", Arc::new(base_ontology().unwrap()));
        let run = pack.create_entry(NewEntry::annotation(TOKEN, 0, 3)).unwrap();
        let entry = pack.get_entry(run).unwrap();
        assert_eq!(entry.field("is_root"), Some(&FieldValue::Bool(false)));
        assert!(entry.field("lemma").unwrap().is_null());
        assert_eq!(entry.modified_fields().count(), 0);
    }

    #[test]
    fn test_predicate_link_capabilities() {
        let mut pack = DataPack::new("She ate.", Arc::new(base_ontology().unwrap()));
        let she = pack.create_entry(NewEntry::annotation(PREDICATE_ARGUMENT, 0, 3)).unwrap();
        let ate = pack.create_entry(NewEntry::annotation(PREDICATE_MENTION, 4, 7)).unwrap();
        let link = pack.create_entry(NewEntry::link(PREDICATE_LINK)).unwrap();

        assert!(matches!(
            pack.set_parent(link, she),
            Err(PackError::TypeMismatch { .. })
        ));
        pack.set_parent(link, ate).unwrap();
        pack.set_child(link, she).unwrap();
        pack.set_fields(link, [("arg_type", "ARG0")]).unwrap();

        let display = PackDisplay::new(&pack)
            .with(PREDICATE_ARGUMENT)
            .and_then(|d| d.with(PREDICATE_MENTION))
            .and_then(|d| d.with_links(PREDICATE_LINK))
            .unwrap();
        insta::assert_snapshot!(display, @r###"
        She ate.
        ╰─╯[A] PredicateArgument
            ╰─╯PredicateMention
              └─PredicateLink─>[A]
        "###);
    }

    #[test]
    fn test_cross_document_coreference() {
        let registry = Arc::new(base_ontology().unwrap());
        let mut first = DataPack::new("Ada wrote.", registry.clone());
        let mut second = DataPack::new("Lovelace died.", registry.clone());
        let ada = first.create_entry(NewEntry::annotation(ENTITY_MENTION, 0, 3)).unwrap();
        let lovelace = second
            .create_entry(NewEntry::annotation(ENTITY_MENTION, 0, 8))
            .unwrap();

        let mut multi = MultiPack::new(registry);
        let first = multi.add_pack(first);
        let second = multi.add_pack(second);
        let group = multi
            .create_entry(
                NewEntry::group(CROSS_DOC_COREFERENCE_GROUP)
                    .member(SubEntry::new(first, ada))
                    .member(SubEntry::new(second, lovelace)),
            )
            .unwrap();

        let texts: Vec<&str> = multi
            .get_members(group)
            .unwrap()
            .into_iter()
            .zip([first, second])
            .map(|(entry, pack_index)| multi.pack(pack_index).unwrap().text_of(entry).unwrap())
            .collect();
        assert_eq!(texts, vec!["Ada", "Lovelace"]);
    }
}
