//! URL handling module for Reroute
//!
//! This module provides the canonicalization used by every rule index: path
//! normalization, page-extension handling, and output encoding.

mod normalize;

// Re-export main types
pub use normalize::UrlNormalizer;
