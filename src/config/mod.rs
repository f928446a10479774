//! Configuration module for Reroute
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use reroute::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Engine enabled: {}", config.engine.enabled);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CycleProtectionConfig, EngineConfig, RulesConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_file_hash, load_config};
