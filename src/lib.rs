//! Reroute: a precedence-ordered redirect resolution engine
//!
//! This crate resolves incoming request paths to redirect targets using three
//! precedence-ordered in-memory rule tables (exact path, section prefix, and
//! regular expression), rebuilt or incrementally patched whenever the backing
//! rule source changes.

pub mod config;
pub mod engine;
pub mod guard;
pub mod index;
pub mod resolver;
pub mod source;
pub mod url;
pub mod usage;

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Outcome, PassReason, RedirectEngine};
pub use guard::{Admission, CycleGuard, CycleState};
pub use resolver::{Redirect, Resolution};
pub use source::{ContentSource, RuleDefinition, RuleKind, RuleTarget, SourceId};
pub use url::UrlNormalizer;
