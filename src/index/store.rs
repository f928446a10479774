use crate::index::entry::{RegexEntry, RuleEntry};
use crate::index::project::Projection;
use crate::source::SourceId;
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Entry counts for one published snapshot generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub exact: usize,
    pub prefix: usize,
    pub regex: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.exact + self.prefix + self.regex
    }
}

/// The three precedence-ordered redirect indices
///
/// Readers load an immutable snapshot per tier and never block. All writes
/// go through the single `write` mutex: a writer clones the current
/// snapshots, applies its change, and publishes the result atomically, so
/// concurrent edits serialize and readers only ever observe complete
/// generations.
pub struct IndexStore {
    exact: ArcSwap<Vec<RuleEntry>>,
    prefix: ArcSwap<Vec<RuleEntry>>,
    regex: ArcSwap<Vec<RegexEntry>>,
    write: Mutex<()>,
    check_duplicates: bool,
}

impl IndexStore {
    /// Creates an empty store
    ///
    /// With `check_duplicates` set, entries whose base (or pattern text, for
    /// the regex tier) equals an already-registered one are dropped; the
    /// first-registered entry wins.
    pub fn new(check_duplicates: bool) -> Self {
        Self {
            exact: ArcSwap::from_pointee(Vec::new()),
            prefix: ArcSwap::from_pointee(Vec::new()),
            regex: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
            check_duplicates,
        }
    }

    /// Replaces all three indices with a freshly projected rule set
    pub fn rebuild(&self, projection: Projection) -> IndexStats {
        let _guard = self.write.lock().unwrap();

        let mut exact = Vec::with_capacity(projection.exact.len());
        for entry in projection.exact {
            push_entry(&mut exact, entry, self.check_duplicates);
        }
        let mut prefix = Vec::with_capacity(projection.prefix.len());
        for entry in projection.prefix {
            push_entry(&mut prefix, entry, self.check_duplicates);
        }
        let mut regex = Vec::with_capacity(projection.regex.len());
        for entry in projection.regex {
            push_regex_entry(&mut regex, entry, self.check_duplicates);
        }

        let stats = IndexStats {
            exact: exact.len(),
            prefix: prefix.len(),
            regex: regex.len(),
        };

        self.exact.store(Arc::new(exact));
        self.prefix.store(Arc::new(prefix));
        self.regex.store(Arc::new(regex));

        stats
    }

    /// Applies a single-rule edit: drops every entry the rule previously
    /// produced, then inserts its re-projected entries
    ///
    /// The whole read-compute-publish sequence runs under the writer lock so
    /// readers never see the rule half-applied across tiers.
    pub fn patch(&self, rule: &SourceId, projection: Projection) -> IndexStats {
        let _guard = self.write.lock().unwrap();

        let mut exact: Vec<RuleEntry> = self
            .exact
            .load()
            .iter()
            .filter(|e| &e.source_id != rule)
            .cloned()
            .collect();
        let mut prefix: Vec<RuleEntry> = self
            .prefix
            .load()
            .iter()
            .filter(|e| &e.source_id != rule)
            .cloned()
            .collect();
        let mut regex: Vec<RegexEntry> = self
            .regex
            .load()
            .iter()
            .filter(|e| &e.source_id != rule)
            .cloned()
            .collect();

        for entry in projection.exact {
            push_entry(&mut exact, entry, self.check_duplicates);
        }
        for entry in projection.prefix {
            push_entry(&mut prefix, entry, self.check_duplicates);
        }
        for entry in projection.regex {
            push_regex_entry(&mut regex, entry, self.check_duplicates);
        }

        let stats = IndexStats {
            exact: exact.len(),
            prefix: prefix.len(),
            regex: regex.len(),
        };

        self.exact.store(Arc::new(exact));
        self.prefix.store(Arc::new(prefix));
        self.regex.store(Arc::new(regex));

        stats
    }

    /// Drops every entry a rule produced, across all three tiers
    pub fn remove(&self, rule: &SourceId) -> IndexStats {
        self.patch(rule, Projection::default())
    }

    /// Looks up an exact-tier entry by path equality
    ///
    /// Scans in registration order so concurrent lookups of the same path
    /// always pick the same entry.
    pub fn lookup_exact(&self, path: &str) -> Option<RuleEntry> {
        self.exact
            .load()
            .iter()
            .find(|e| e.base == path)
            .cloned()
    }

    /// Looks up a prefix-tier entry whose base occurs anywhere in the path
    pub fn lookup_prefix(&self, path: &str) -> Option<RuleEntry> {
        self.prefix
            .load()
            .iter()
            .find(|e| path.contains(&e.base))
            .cloned()
    }

    /// Looks up the first regex-tier entry whose pattern matches the path
    pub fn lookup_regex(&self, path: &str) -> Option<RegexEntry> {
        self.regex
            .load()
            .iter()
            .find(|e| e.pattern.is_match(path))
            .cloned()
    }

    /// Returns entry counts for the current snapshots
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            exact: self.exact.load().len(),
            prefix: self.prefix.load().len(),
            regex: self.regex.load().len(),
        }
    }
}

fn push_entry(entries: &mut Vec<RuleEntry>, entry: RuleEntry, check_duplicates: bool) {
    if check_duplicates {
        if let Some(existing) = entries.iter().find(|e| e.base == entry.base) {
            debug!(
                base = %entry.base,
                kept = %existing.source_id,
                dropped = %entry.source_id,
                "duplicate base suppressed"
            );
            return;
        }
    }
    entries.push(entry);
}

fn push_regex_entry(entries: &mut Vec<RegexEntry>, entry: RegexEntry, check_duplicates: bool) {
    if check_duplicates {
        if let Some(existing) = entries
            .iter()
            .find(|e| e.pattern.as_str() == entry.pattern.as_str())
        {
            debug!(
                pattern = %entry.pattern.as_str(),
                kept = %existing.source_id,
                dropped = %entry.source_id,
                "duplicate pattern suppressed"
            );
            return;
        }
    }
    entries.push(entry);
}
