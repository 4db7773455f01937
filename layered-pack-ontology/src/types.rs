//! Type names declared by [`base_ontology`](crate::base_ontology).

pub const TOKEN: &str = "Token";
pub const DOCUMENT: &str = "Document";
pub const SENTENCE: &str = "Sentence";
pub const UTTERANCE: &str = "Utterance";
pub const ENTITY_MENTION: &str = "EntityMention";
pub const PREDICATE_MENTION: &str = "PredicateMention";
pub const PREDICATE_ARGUMENT: &str = "PredicateArgument";

pub const PREDICATE_LINK: &str = "PredicateLink";
pub const DEPENDENCY: &str = "Dependency";
pub const ENHANCED_DEPENDENCY: &str = "EnhancedDependency";
pub const RELATION_LINK: &str = "RelationLink";

pub const COREFERENCE_GROUP: &str = "CoreferenceGroup";

/// Cross-document relation between two entity mentions
pub const CROSS_DOC_ENTITY_RELATION: &str = "CrossDocEntityRelation";
/// Entity mentions across documents that refer to the same thing
pub const CROSS_DOC_COREFERENCE_GROUP: &str = "CrossDocCoreferenceGroup";
