use crate::source::SourceId;
use regex::Regex;

/// One entry in the exact or prefix index
///
/// Entries are immutable once created; an update is modeled as
/// remove-then-add by the store, never in-place mutation. The projection
/// guarantees `base` is canonicalized and that neither `base` nor `target`
/// is empty.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    /// Identifier of the rule definition that produced this entry
    pub source_id: SourceId,

    /// Canonicalized path (exact tier) or section prefix (prefix tier)
    pub base: String,

    /// Target URL: site-relative for internal targets, absolute for external
    pub target: String,

    /// Query string appended to the target on every hit
    pub target_query: Option<String>,

    /// External targets skip the virtual-folder prefix on composition
    pub external: bool,

    /// Redirect status code; 0 means "use the configured default"
    pub status_code: u16,
}

/// One entry in the regex index
#[derive(Debug, Clone)]
pub struct RegexEntry {
    /// Identifier of the rule definition that produced this entry
    pub source_id: SourceId,

    /// Compiled case-insensitive match pattern
    pub pattern: Regex,

    /// Static replacement text; the second capture group of `pattern` is
    /// appended after it on substitution
    pub replacement: String,

    /// Redirect status code; 0 means "use the configured default"
    pub status_code: u16,
}
