use crate::source::{
    ContentSource, RuleDefinition, SourceError, SourceId, SourceResult,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One content item known to a [`MemorySource`]
#[derive(Debug, Clone)]
pub struct ItemRecord {
    /// Canonical site-relative URL (lower-case, decoded, extension-carrying)
    pub url: String,

    /// Whether the item has renderable presentation
    pub presentation: bool,

    /// Direct children in the section hierarchy
    pub children: Vec<SourceId>,
}

/// In-memory content source
///
/// Holds a small item graph plus a rule list. Backs the CLI's file-based
/// rule source and serves as the test double for the engine.
pub struct MemorySource {
    items: HashMap<SourceId, ItemRecord>,
    rules: Vec<RuleDefinition>,
    root_present: AtomicBool,
    last_used: Mutex<HashMap<SourceId, DateTime<Utc>>>,
}

impl MemorySource {
    /// Creates an empty source with a present rule root
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            rules: Vec::new(),
            root_present: AtomicBool::new(true),
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a source whose rule root is missing
    ///
    /// `rules()` on the result fails with [`SourceError::RootMissing`].
    pub fn without_root() -> Self {
        Self {
            root_present: AtomicBool::new(false),
            ..Self::new()
        }
    }

    /// Marks the rule root as gone; subsequent `rules()` calls fail
    pub fn remove_root(&self) {
        self.root_present.store(false, Ordering::SeqCst);
    }

    /// Registers a content item
    pub fn add_item(&mut self, id: impl Into<SourceId>, record: ItemRecord) {
        self.items.insert(id.into(), record);
    }

    /// Registers a rule definition
    pub fn add_rule(&mut self, rule: RuleDefinition) {
        self.rules.push(rule);
    }

    /// Returns the last-used stamp recorded for a rule, if any
    pub fn last_used(&self, rule: &SourceId) -> Option<DateTime<Utc>> {
        self.last_used.lock().unwrap().get(rule).copied()
    }

    /// Returns the number of registered rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSource for MemorySource {
    fn rules(&self) -> SourceResult<Vec<RuleDefinition>> {
        if !self.root_present.load(Ordering::SeqCst) {
            return Err(SourceError::RootMissing);
        }
        Ok(self.rules.clone())
    }

    fn canonical_url(&self, item: &SourceId) -> Option<String> {
        self.items.get(item).map(|i| i.url.to_lowercase())
    }

    fn has_presentation(&self, item: &SourceId) -> bool {
        self.items.get(item).map(|i| i.presentation).unwrap_or(false)
    }

    fn descendants(&self, item: &SourceId) -> Vec<SourceId> {
        // Hierarchies are trees in practice, but a visited set keeps a
        // malformed (cyclic) graph from looping the walk.
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut stack: Vec<SourceId> = match self.items.get(item) {
            Some(record) => record.children.clone(),
            None => return result,
        };
        visited.insert(item.clone());

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(record) = self.items.get(&id) {
                stack.extend(record.children.iter().cloned());
            }
            result.push(id);
        }

        result
    }

    fn record_use(&self, rule: &SourceId, when: DateTime<Utc>) -> SourceResult<()> {
        // Unknown ids are ignored: last-used stamping is best-effort.
        if self.rules.iter().any(|r| &r.id == rule) {
            self.last_used.lock().unwrap().insert(rule.clone(), when);
        }
        Ok(())
    }
}
