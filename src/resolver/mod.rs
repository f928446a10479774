//! Redirect resolution
//!
//! Walks the three indices in precedence order (exact, then prefix, then
//! regex) and composes the outgoing redirect URL for the first hit: query
//! strings are merged, internal targets get the virtual-folder prefix, and
//! the whole path is re-encoded for output.

use crate::index::{IndexStore, RuleEntry};
use crate::source::SourceId;
use crate::url::UrlNormalizer;
use std::sync::Arc;
use tracing::debug;

/// A resolved redirect ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Fully composed outgoing URL, query string included
    pub target_url: String,

    /// HTTP status code to respond with
    pub status_code: u16,

    /// Identifier of the rule definition that matched
    pub source_id: SourceId,
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect(Redirect),
    Miss,
}

/// Resolves request paths against the published indices
pub struct RedirectResolver {
    store: Arc<IndexStore>,
    normalizer: UrlNormalizer,
    default_status_code: u16,
}

impl RedirectResolver {
    pub fn new(store: Arc<IndexStore>, normalizer: UrlNormalizer, default_status_code: u16) -> Self {
        Self {
            store,
            normalizer,
            default_status_code,
        }
    }

    /// Resolves a raw request path, trying each tier in precedence order
    ///
    /// # Arguments
    ///
    /// * `path` - Raw request path, normalized internally
    /// * `query` - Live request query string, merged into the target on a hit
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Resolution {
        let normalized = self.normalizer.normalize(path);
        if normalized.is_empty() {
            return Resolution::Miss;
        }

        // Exact tier compares against the extension-carrying form.
        let exact_probe = self.normalizer.check_page_extension(&normalized);
        if let Some(entry) = self.store.lookup_exact(&exact_probe) {
            debug!(path, rule = %entry.source_id, "exact redirect hit");
            return Resolution::Redirect(self.entry_redirect(&entry, query));
        }

        // Prefix and regex tiers compare against the extension-stripped form.
        let prefix_probe = self.normalizer.remove_page_extension(&normalized);
        if let Some(entry) = self.store.lookup_prefix(&prefix_probe) {
            debug!(path, rule = %entry.source_id, "prefix redirect hit");
            return Resolution::Redirect(self.entry_redirect(&entry, query));
        }

        // Regex patterns are written against the public (encoded,
        // virtual-folder-carrying) shape of the path.
        let regex_probe = format!(
            "{}{}",
            self.normalizer.virtual_folder(),
            self.normalizer.encode_url(&prefix_probe)
        );
        if let Some(entry) = self.store.lookup_regex(&regex_probe) {
            debug!(path, rule = %entry.source_id, "regex redirect hit");
            // A regex hit is replace-then-encode only; the live query string
            // is not carried over.
            let substitution = format!("{}$2", entry.replacement);
            let target = entry
                .pattern
                .replace(&regex_probe, substitution.as_str())
                .into_owned();
            return Resolution::Redirect(Redirect {
                target_url: self.normalizer.encode_url(&target),
                status_code: self.effective_status(entry.status_code),
                source_id: entry.source_id,
            });
        }

        Resolution::Miss
    }

    /// Composes the outgoing redirect for an exact/prefix hit
    fn entry_redirect(&self, entry: &RuleEntry, query: Option<&str>) -> Redirect {
        let target = if entry.external {
            entry.target.clone()
        } else {
            self.normalizer.encode_url(&format!(
                "{}{}",
                self.normalizer.virtual_folder(),
                entry.target
            ))
        };

        Redirect {
            target_url: compose_target(&target, entry.target_query.as_deref(), query),
            status_code: self.effective_status(entry.status_code),
            source_id: entry.source_id.clone(),
        }
    }

    fn effective_status(&self, status_code: u16) -> u16 {
        if status_code == 0 {
            self.default_status_code
        } else {
            status_code
        }
    }
}

/// Joins the stored rule query and the live request query onto the target
///
/// Both present yields `target?stored&live`; one present yields
/// `target?that-one`; neither leaves the target untouched.
fn compose_target(target: &str, stored: Option<&str>, live: Option<&str>) -> String {
    let stored = stored.filter(|q| !q.is_empty());
    let live = live.filter(|q| !q.is_empty());
    match (stored, live) {
        (Some(s), Some(l)) => format!("{}?{}&{}", target, s, l),
        (Some(s), None) => format!("{}?{}", target, s),
        (None, Some(l)) => format!("{}?{}", target, l),
        (None, None) => target.to_string(),
    }
}
