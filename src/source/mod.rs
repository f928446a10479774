//! Rule source module
//!
//! This module defines the trait interface to the external content source
//! that owns rule definitions, plus the plain-data rule model the engine
//! consumes. The engine never walks the content repository itself; it asks
//! the source for rule definitions, canonical URLs, presentation flags, and
//! section descendants.

mod file;
mod memory;

pub use file::{load_rules, FileSource};
pub use memory::{ItemRecord, MemorySource};

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while reading from a rule source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Rule source root not found; nothing to index")]
    RootMissing,

    #[error("Unknown item referenced by rule: {0}")]
    UnknownItem(String),

    #[error("Invalid rule definition: {0}")]
    Validation(String),

    #[error("Failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rules TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for rule source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Identifier of the rule definition (or content item) that produced one or
/// more index entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where a redirect rule points
#[derive(Debug, Clone)]
pub enum RuleTarget {
    /// An item inside the content source, resolved to a canonical URL at
    /// projection time
    Internal { item: SourceId },

    /// An external URL emitted verbatim
    External { url: String },
}

/// One rule definition as read from the content source
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub id: SourceId,
    pub kind: RuleKind,
    /// Redirect status code; 0 means "use the configured default"
    pub status_code: u16,
}

/// The four rule shapes the projection understands
///
/// Any source item outside these shapes projects to nothing.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// One exact-tier entry
    ItemToItem {
        base: String,
        target: RuleTarget,
        target_query: Option<String>,
    },

    /// One prefix-tier entry
    SectionToItem {
        base: String,
        target: RuleTarget,
        target_query: Option<String>,
    },

    /// One prefix-tier entry for the section mapping plus exact-tier entries
    /// for the target section and each of its descendants
    SectionToSection {
        base: String,
        target_section: SourceId,
    },

    /// One regex-tier entry; both fields compiled case-insensitively
    Regex { pattern: String, replacement: String },
}

/// Trait for content-source backends
///
/// Implementations must be thread-safe: `rules` is called under the index
/// writer lock while `record_use` runs on the usage worker thread.
///
/// `canonical_url` must return lower-case, site-relative URLs in decoded
/// form (spaces rather than `-`/`_` separators) that already carry the
/// site's page extension.
pub trait ContentSource: Send + Sync {
    /// Returns every rule definition under the rule root
    ///
    /// Fails with [`SourceError::RootMissing`] when the rule root itself is
    /// absent; individual malformed rules are the projection's concern, not
    /// this method's.
    fn rules(&self) -> SourceResult<Vec<RuleDefinition>>;

    /// Resolves an item to its canonical site-relative URL
    fn canonical_url(&self, item: &SourceId) -> Option<String>;

    /// Returns true if the item has renderable presentation
    fn has_presentation(&self, item: &SourceId) -> bool;

    /// Returns all descendants of a section item
    ///
    /// Implementations must tolerate malformed (cyclic) hierarchies.
    fn descendants(&self, item: &SourceId) -> Vec<SourceId>;

    /// Stamps "last used" on the originating rule definition
    ///
    /// Best-effort telemetry: an unknown id is not an error.
    fn record_use(&self, rule: &SourceId, when: DateTime<Utc>) -> SourceResult<()>;
}
