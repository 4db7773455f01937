use crate::{EntryId, FieldValue};

/// Kind-specific constructor arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryArgs<A> {
    Annotation { begin: usize, end: usize },
    Link { parent: Option<A>, child: Option<A> },
    Group { members: Vec<A> },
}

/// Everything needed to create one entry through a pack's factory.
///
/// ```
/// use layered_pack::{EntryId, NewEntry};
///
/// let token = NewEntry::annotation("Token", 0, 4)
///     .creator("tokenizer")
///     .field("pos", "NNP");
/// assert_eq!(token.type_name(), "Token");
///
/// let dep = NewEntry::link("Dependency")
///     .parent(EntryId::new(0))
///     .child(EntryId::new(1));
/// assert_eq!(dep.addresses().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry<A = EntryId> {
    pub(crate) type_name: String,
    pub(crate) creator: Option<String>,
    pub(crate) fields: Vec<(String, FieldValue)>,
    pub(crate) args: EntryArgs<A>,
}

impl NewEntry<EntryId> {
    /// A span annotation; bounds are checked when the entry is created.
    pub fn annotation(type_name: impl Into<String>, begin: usize, end: usize) -> Self {
        Self::with_args(type_name, EntryArgs::Annotation { begin, end })
    }
}

impl<A: Copy> NewEntry<A> {
    fn with_args(type_name: impl Into<String>, args: EntryArgs<A>) -> Self {
        Self {
            type_name: type_name.into(),
            creator: None,
            fields: Vec::new(),
            args,
        }
    }

    /// A link, with endpoints to be supplied by [`parent`](Self::parent) and
    /// [`child`](Self::child).
    pub fn link(type_name: impl Into<String>) -> Self {
        Self::with_args(
            type_name,
            EntryArgs::Link {
                parent: None,
                child: None,
            },
        )
    }

    /// An empty group; add members with [`member`](Self::member) or [`members`](Self::members).
    pub fn group(type_name: impl Into<String>) -> Self {
        Self::with_args(type_name, EntryArgs::Group { members: Vec::new() })
    }

    /// Set the parent endpoint. Ignored unless this is a link.
    pub fn parent(mut self, address: A) -> Self {
        if let EntryArgs::Link { parent, .. } = &mut self.args {
            *parent = Some(address);
        }
        self
    }

    /// Set the child endpoint. Ignored unless this is a link.
    pub fn child(mut self, address: A) -> Self {
        if let EntryArgs::Link { child, .. } = &mut self.args {
            *child = Some(address);
        }
        self
    }

    /// Add one member. Ignored unless this is a group.
    pub fn member(self, address: A) -> Self {
        self.members(std::iter::once(address))
    }

    /// Add several members. Ignored unless this is a group.
    pub fn members(mut self, addresses: impl IntoIterator<Item = A>) -> Self {
        if let EntryArgs::Group { members } = &mut self.args {
            members.extend(addresses);
        }
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn args(&self) -> &EntryArgs<A> {
        &self.args
    }

    /// Every endpoint or member address referenced by the arguments.
    pub fn addresses(&self) -> impl Iterator<Item = A> + '_ {
        let (ends, members) = match &self.args {
            EntryArgs::Annotation { .. } => ([None, None], &[][..]),
            EntryArgs::Link { parent, child } => ([*parent, *child], &[][..]),
            EntryArgs::Group { members } => ([None, None], members.as_slice()),
        };
        ends.into_iter().flatten().chain(members.iter().copied())
    }
}
