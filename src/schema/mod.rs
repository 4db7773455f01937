//! Entry type declarations and the registry that checks them.
//!
//! The registry is an explicit value handed to every pack at construction.
//! It records, per declared type, the supertype it extends, the capability
//! each relation role requires, and the field list. Capability checks walk
//! the supertype chain at mutation time, so any declared type can be used as
//! an endpoint or member constraint.

mod field;

pub use field::{FieldDecl, FieldType, FieldValue};

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{PackError, PackResult};

/// The root every declared type ultimately extends.
pub const ENTRY: &str = "Entry";

/// The structural family of an entry type, fixed by the builtin root it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Anchored to a span of one document
    Annotation,
    /// Directed relation between two entries of one document
    Link,
    /// Unordered set of entries of one document
    Group,
    /// Directed relation between entries of (possibly) different sub-packs
    MultiPackLink,
    /// Unordered set of entries spread over sub-packs
    MultiPackGroup,
}

impl EntryKind {
    pub const ALL: [EntryKind; 5] = [
        EntryKind::Annotation,
        EntryKind::Link,
        EntryKind::Group,
        EntryKind::MultiPackLink,
        EntryKind::MultiPackGroup,
    ];

    /// Name of the builtin type at the root of this kind.
    pub fn root_type(self) -> &'static str {
        match self {
            EntryKind::Annotation => "Annotation",
            EntryKind::Link => "Link",
            EntryKind::Group => "Group",
            EntryKind::MultiPackLink => "MultiPackLink",
            EntryKind::MultiPackGroup => "MultiPackGroup",
        }
    }

    /// Kinds whose endpoints or members are `SubEntry` addresses.
    pub fn is_multi_pack(self) -> bool {
        matches!(self, EntryKind::MultiPackLink | EntryKind::MultiPackGroup)
    }

    pub fn is_link(self) -> bool {
        matches!(self, EntryKind::Link | EntryKind::MultiPackLink)
    }

    pub fn is_group(self) -> bool {
        matches!(self, EntryKind::Group | EntryKind::MultiPackGroup)
    }
}

/// Declaration of one entry type, as produced by the schema layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTypeDecl {
    /// Unique type name, e.g. `"Token"`
    pub name: String,
    /// Type this one extends; only builtin roots have none
    #[serde(default)]
    pub supertype: Option<String>,
    /// Capability required of a link's parent (inherited when absent)
    #[serde(default)]
    pub parent: Option<String>,
    /// Capability required of a link's child (inherited when absent)
    #[serde(default)]
    pub child: Option<String>,
    /// Capability required of a group's members (inherited when absent)
    #[serde(default)]
    pub member: Option<String>,
    /// Fields introduced by this type; supertype fields are inherited
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    /// Abstract types may be used as capabilities but not instantiated
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

impl EntryTypeDecl {
    /// Declare a type extending `supertype`.
    pub fn new(name: impl Into<String>, supertype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: Some(supertype.into()),
            parent: None,
            child: None,
            member: None,
            fields: Vec::new(),
            is_abstract: false,
        }
    }

    fn root(kind: Option<EntryKind>) -> Self {
        let name = kind.map_or(ENTRY, EntryKind::root_type);
        Self {
            name: name.to_string(),
            supertype: kind.map(|_| ENTRY.to_string()),
            parent: None,
            child: None,
            member: None,
            fields: Vec::new(),
            is_abstract: kind.is_none(),
        }
    }

    /// Declare a span annotation type directly under `Annotation`.
    pub fn annotation(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Annotation.root_type())
    }

    /// Declare a link type directly under `Link`.
    pub fn link(
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self::new(name, EntryKind::Link.root_type()).with_endpoints(parent, child)
    }

    /// Declare a group type directly under `Group`.
    pub fn group(name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Group.root_type()).with_member(member)
    }

    /// Declare a cross-document link type directly under `MultiPackLink`.
    pub fn multi_pack_link(
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self::new(name, EntryKind::MultiPackLink.root_type()).with_endpoints(parent, child)
    }

    /// Declare a cross-document group type directly under `MultiPackGroup`.
    pub fn multi_pack_group(name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::new(name, EntryKind::MultiPackGroup.root_type()).with_member(member)
    }

    pub fn with_endpoints(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self.child = Some(child.into());
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Shorthand for an optional field defaulting to `Null`.
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.with_field(FieldDecl::new(name, ty))
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

static BUILTIN_TYPES: Lazy<Vec<EntryTypeDecl>> = Lazy::new(|| {
    std::iter::once(EntryTypeDecl::root(None))
        .chain(EntryKind::ALL.iter().map(|kind| EntryTypeDecl::root(Some(*kind))))
        .collect()
});

/// The set of declared entry types a pack validates against.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: HashMap<String, EntryTypeDecl>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// A registry holding only the builtin roots.
    pub fn new() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .map(|decl| (decl.name.clone(), decl.clone()))
            .collect();
        Self { types }
    }

    /// Load declarations from a RON list, registering them in order.
    ///
    /// ```
    /// use layered_pack::SchemaRegistry;
    ///
    /// let registry = SchemaRegistry::from_ron(r#"[
    ///     (name: "Token", supertype: Some("Annotation")),
    ///     (
    ///         name: "Dependency",
    ///         supertype: Some("Link"),
    ///         parent: Some("Token"),
    ///         child: Some("Token"),
    ///     ),
    /// ]"#).unwrap();
    /// assert!(registry.is_instance("Token", "Annotation"));
    /// assert_eq!(registry.parent_capability("Dependency"), "Token");
    /// ```
    pub fn from_ron(source: &str) -> PackResult<Self> {
        let decls: Vec<EntryTypeDecl> =
            ron::from_str(source).map_err(|e| PackError::Serialization(e.to_string()))?;
        let mut registry = Self::new();
        for decl in decls {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, decl: EntryTypeDecl) -> PackResult<Self> {
        self.register(decl)?;
        Ok(self)
    }

    /// Add a declaration.
    ///
    /// The supertype must already be registered; capability types may name
    /// any registered type (or the declaration itself, for self-referential
    /// links). Field names may not shadow inherited fields and defaults must
    /// conform to their declared type.
    pub fn register(&mut self, decl: EntryTypeDecl) -> PackResult<()> {
        let name = decl.name.clone();
        if self.types.contains_key(&name) {
            return Err(PackError::schema(name, "type is already registered"));
        }
        let supertype = match &decl.supertype {
            Some(supertype) => supertype,
            None => return Err(PackError::schema(name, "declared types must name a supertype")),
        };
        if !self.types.contains_key(supertype) {
            return Err(PackError::schema(
                name,
                format!("unknown supertype `{}`", supertype),
            ));
        }
        if supertype == ENTRY {
            return Err(PackError::schema(
                name,
                "extend one of Annotation, Link, Group, MultiPackLink or MultiPackGroup",
            ));
        }

        let kind = self.kind_of(supertype)?;
        let relation_roles = [
            ("parent", &decl.parent, kind.is_link()),
            ("child", &decl.child, kind.is_link()),
            ("member", &decl.member, kind.is_group()),
        ];
        for (role, capability, allowed) in relation_roles {
            if let Some(capability) = capability {
                if !allowed {
                    return Err(PackError::schema(
                        name,
                        format!("{:?} types cannot declare a {} type", kind, role),
                    ));
                }
                if capability != &name && !self.types.contains_key(capability) {
                    return Err(PackError::schema(
                        name,
                        format!("unknown {} type `{}`", role, capability),
                    ));
                }
            }
        }

        for (i, field) in decl.fields.iter().enumerate() {
            if self.field(supertype, &field.name).is_some()
                || decl.fields[..i].iter().any(|f| f.name == field.name)
            {
                return Err(PackError::schema(
                    name,
                    format!("field `{}` is declared twice", field.name),
                ));
            }
            if !field.default.conforms_to(field.ty) {
                return Err(PackError::schema(
                    name,
                    format!("default of field `{}` is not a {}", field.name, field.ty),
                ));
            }
        }

        tracing::trace!(type_name = %name, ?kind, "registered entry type");
        self.types.insert(name, decl);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntryTypeDecl> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up a declaration, failing with a schema violation if it is unknown.
    pub fn decl(&self, name: &str) -> PackResult<&EntryTypeDecl> {
        self.get(name)
            .ok_or_else(|| PackError::schema(name, "type is not declared"))
    }

    /// All registered declarations, builtins included, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = &EntryTypeDecl> {
        self.types.values()
    }

    /// Walk from `name` up to the `Entry` root, starting with `name` itself.
    pub fn ancestors<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a EntryTypeDecl> + 'a {
        std::iter::successors(self.get(name), move |decl| {
            decl.supertype.as_deref().and_then(|s| self.get(s))
        })
    }

    /// The structural kind of a type, from the builtin root it extends.
    pub fn kind_of(&self, name: &str) -> PackResult<EntryKind> {
        self.decl(name)?;
        self.ancestors(name)
            .find_map(|decl| {
                EntryKind::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.root_type() == decl.name)
            })
            .ok_or_else(|| PackError::schema(name, "abstract root type has no kind"))
    }

    /// Returns true if `actual` is `declared` or extends it.
    ///
    /// Every registered type is an instance of [`ENTRY`].
    pub fn is_instance(&self, actual: &str, declared: &str) -> bool {
        self.ancestors(actual).any(|decl| decl.name == declared)
    }

    fn capability<'a>(
        &'a self,
        name: &str,
        pick: impl Fn(&'a EntryTypeDecl) -> Option<&'a String>,
    ) -> &'a str {
        self.ancestors(name)
            .find_map(pick)
            .map_or(ENTRY, String::as_str)
    }

    /// Type required of a link's parent; `Entry` when nothing is declared.
    pub fn parent_capability(&self, name: &str) -> &str {
        self.capability(name, |decl| decl.parent.as_ref())
    }

    /// Type required of a link's child; `Entry` when nothing is declared.
    pub fn child_capability(&self, name: &str) -> &str {
        self.capability(name, |decl| decl.child.as_ref())
    }

    /// Type required of a group's members; `Entry` when nothing is declared.
    pub fn member_capability(&self, name: &str) -> &str {
        self.capability(name, |decl| decl.member.as_ref())
    }

    /// Find a field declared on `name` or any of its supertypes.
    pub fn field(&self, name: &str, field: &str) -> Option<&FieldDecl> {
        self.ancestors(name)
            .flat_map(|decl| decl.fields.iter())
            .find(|f| f.name == field)
    }

    /// Every field of `name`, inherited ones included.
    pub fn fields<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a FieldDecl> + 'a {
        self.ancestors(name).flat_map(|decl| decl.fields.iter())
    }

    /// Check that an entry of type `name` can be constructed.
    pub(crate) fn instantiable(&self, name: &str) -> PackResult<EntryKind> {
        let decl = self.decl(name)?;
        if decl.is_abstract {
            return Err(PackError::schema(name, "abstract types cannot be instantiated"));
        }
        self.kind_of(name)
    }
}
