//! Pack configuration.

use serde::{Deserialize, Serialize};

use crate::{PackError, PackResult};

/// Which optional secondary indices a store keeps live.
///
/// The id map, type index and creator index are always maintained. The
/// indices toggled here only change how queries are served: with an index
/// off, the query that would use it falls back to a full scan and returns
/// the same results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Annotations ordered by span, for span-ordered and within-span queries
    pub span: bool,
    /// Endpoint → links adjacency
    pub links: bool,
    /// Member → groups membership
    pub groups: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl IndexConfig {
    /// Every optional index on.
    pub fn all() -> Self {
        Self {
            span: true,
            links: true,
            groups: true,
        }
    }

    /// Every optional index off; queries scan.
    pub fn none() -> Self {
        Self {
            span: false,
            links: false,
            groups: false,
        }
    }
}

/// Configuration for a pack or multi-pack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Optional indices to maintain
    pub indexes: IndexConfig,
    /// Creator label for entries created without one
    pub default_creator: Option<String>,
}

impl PackConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that keeps no optional index, trading query speed for
    /// cheaper mutation.
    pub fn scan_only() -> Self {
        Self {
            indexes: IndexConfig::none(),
            ..Default::default()
        }
    }

    pub fn with_indexes(mut self, indexes: IndexConfig) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn with_default_creator(mut self, creator: impl Into<String>) -> Self {
        self.default_creator = Some(creator.into());
        self
    }

    /// Parse a config document. Missing keys keep their defaults.
    ///
    /// ```
    /// use layered_pack::PackConfig;
    ///
    /// let source = "(indexes: (links: false), default_creator: Some(\"reader\"))";
    /// let config = PackConfig::from_ron(source).unwrap();
    /// assert!(!config.indexes.links);
    /// assert!(config.indexes.span);
    /// assert_eq!(config.default_creator.as_deref(), Some("reader"));
    /// ```
    pub fn from_ron(source: &str) -> PackResult<Self> {
        ron::from_str(source).map_err(|e| PackError::Serialization(e.to_string()))
    }
}
