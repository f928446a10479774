//! The redirect engine
//!
//! Ties the pieces together: it owns the index store, rebuilds or patches it
//! when the rule source changes, and decides per request whether to serve a
//! redirect or pass the request through untouched.

use crate::config::Config;
use crate::guard::{Admission, CycleGuard, CycleState};
use crate::index::{IndexStats, IndexStore, Projector};
use crate::resolver::{Redirect, RedirectResolver, Resolution};
use crate::source::{ContentSource, RuleDefinition, SourceId, SourceResult};
use crate::url::UrlNormalizer;
use crate::usage::UsageRecorder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Why a request was passed through without a redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// The engine is switched off in configuration
    Disabled,

    /// The request path starts with an ignored prefix
    IgnoredPath,

    /// A rule matched but the client hit the consecutive-redirect limit
    CycleLimit,

    /// No rule matched
    NoRule,
}

/// Per-request decision of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Redirect(Redirect),
    Pass(PassReason),
}

/// The redirect engine
///
/// One instance serves the whole process: request handling reads published
/// index snapshots without locking, while rule-change notifications
/// serialize through the store's writer lock.
pub struct RedirectEngine {
    enabled: bool,
    rebuild_on_edit: bool,
    check_presentation: bool,
    ignore_prefixes: Vec<String>,
    normalizer: UrlNormalizer,
    source: Arc<dyn ContentSource>,
    store: Arc<IndexStore>,
    resolver: RedirectResolver,
    guard: CycleGuard,
    recorder: UsageRecorder,
}

impl RedirectEngine {
    /// Creates an engine over a rule source
    ///
    /// The indices start empty; call [`rebuild`](Self::rebuild) to load the
    /// initial rule set.
    pub fn new(config: &Config, source: Arc<dyn ContentSource>) -> Self {
        let normalizer = UrlNormalizer::new(&config.site);
        let store = Arc::new(IndexStore::new(config.engine.check_duplicates));
        let resolver = RedirectResolver::new(
            store.clone(),
            normalizer.clone(),
            config.engine.default_status_code,
        );
        let ignore_prefixes = config
            .engine
            .ignore_prefixes
            .iter()
            .map(|p| p.to_lowercase())
            .collect();

        Self {
            enabled: config.engine.enabled,
            rebuild_on_edit: config.engine.rebuild_on_edit,
            check_presentation: config.engine.check_presentation,
            ignore_prefixes,
            normalizer,
            source: source.clone(),
            store,
            resolver,
            guard: CycleGuard::new(&config.cycle_protection),
            recorder: UsageRecorder::new(source),
        }
    }

    /// Rebuilds all three indices from the rule source
    ///
    /// A source failure (including a missing rule root) leaves the published
    /// snapshots untouched, so the engine keeps serving the last good
    /// generation.
    pub fn rebuild(&self) -> SourceResult<IndexStats> {
        let started = Instant::now();
        let rules = self.source.rules()?;
        let projector = Projector::new(&self.normalizer, self.source.as_ref(), self.check_presentation);
        let stats = self.store.rebuild(projector.project_all(&rules));

        info!(
            rules = rules.len(),
            exact = stats.exact,
            prefix = stats.prefix,
            regex = stats.regex,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "redirect indices rebuilt"
        );

        Ok(stats)
    }

    /// Applies a single rule edit (create or update)
    pub fn on_rule_changed(&self, rule: &RuleDefinition) -> SourceResult<IndexStats> {
        if self.rebuild_on_edit {
            return self.rebuild();
        }

        let projector = Projector::new(&self.normalizer, self.source.as_ref(), self.check_presentation);
        let stats = self.store.patch(&rule.id, projector.project(rule));
        info!(rule = %rule.id, entries = stats.total(), "redirect indices patched");
        Ok(stats)
    }

    /// Drops a deleted rule's entries
    pub fn on_rule_deleted(&self, rule: &SourceId) -> IndexStats {
        let stats = self.store.remove(rule);
        info!(rule = %rule, entries = stats.total(), "redirect rule removed");
        stats
    }

    /// Handles a wholesale replacement of the rule folder
    pub fn on_rules_replaced(&self) -> SourceResult<IndexStats> {
        self.rebuild()
    }

    /// Decides what to do with one incoming request
    ///
    /// The caller owns `cycle`: it parses the client's counter cookie before
    /// the call and writes the updated value back afterwards.
    pub fn handle(&self, path: &str, query: Option<&str>, cycle: &mut CycleState) -> Outcome {
        if !self.enabled {
            return Outcome::Pass(PassReason::Disabled);
        }
        if self.is_ignored(path) {
            // An ignored page is served plainly, which ends any redirect chain.
            self.guard.reset(cycle);
            return Outcome::Pass(PassReason::IgnoredPath);
        }

        match self.resolver.resolve(path, query) {
            Resolution::Redirect(redirect) => match self.guard.admit(cycle) {
                Admission::Admitted => {
                    self.recorder.record(redirect.source_id.clone());
                    Outcome::Redirect(redirect)
                }
                Admission::Denied => {
                    warn!(path, rule = %redirect.source_id, "consecutive-redirect limit reached, passing through");
                    Outcome::Pass(PassReason::CycleLimit)
                }
            },
            Resolution::Miss => {
                // A plainly served page ends any redirect chain.
                self.guard.reset(cycle);
                Outcome::Pass(PassReason::NoRule)
            }
        }
    }

    /// Entry counts for the currently published snapshots
    pub fn stats(&self) -> IndexStats {
        self.store.stats()
    }

    fn is_ignored(&self, path: &str) -> bool {
        if self.ignore_prefixes.is_empty() {
            return false;
        }
        let path = path.to_lowercase();
        self.ignore_prefixes.iter().any(|p| path.starts_with(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CycleProtectionConfig, EngineConfig, RulesConfig, SiteConfig};
    use crate::source::{ItemRecord, MemorySource, RuleKind, RuleTarget};

    fn test_config() -> Config {
        Config {
            engine: EngineConfig {
                enabled: true,
                default_status_code: 301,
                check_duplicates: false,
                check_presentation: false,
                rebuild_on_edit: false,
                ignore_prefixes: vec![],
            },
            cycle_protection: CycleProtectionConfig::default(),
            site: SiteConfig {
                virtual_folder: String::new(),
                start_item: "/home".to_string(),
                page_extension: ".html".to_string(),
            },
            rules: RulesConfig::default(),
        }
    }

    fn item(url: &str) -> ItemRecord {
        ItemRecord {
            url: url.to_string(),
            presentation: true,
            children: vec![],
        }
    }

    fn item_rule(id: &str, base: &str, target_item: &str) -> RuleDefinition {
        RuleDefinition {
            id: SourceId::from(id),
            kind: RuleKind::ItemToItem {
                base: base.to_string(),
                target: RuleTarget::Internal {
                    item: SourceId::from(target_item),
                },
                target_query: None,
            },
            status_code: 0,
        }
    }

    fn sample_source() -> MemorySource {
        let mut source = MemorySource::new();
        source.add_item("about-us", item("/about us.html"));
        source.add_rule(item_rule("r1", "/about", "about-us"));
        source
    }

    fn redirect_of(outcome: Outcome) -> Redirect {
        match outcome {
            Outcome::Redirect(r) => r,
            Outcome::Pass(reason) => panic!("expected a redirect, got pass: {reason:?}"),
        }
    }

    #[test]
    fn test_rebuild_and_handle() {
        let engine = RedirectEngine::new(&test_config(), Arc::new(sample_source()));
        let stats = engine.rebuild().unwrap();
        assert_eq!(stats.exact, 1);

        let mut cycle = CycleState::new();
        let redirect = redirect_of(engine.handle("/About", None, &mut cycle));
        assert_eq!(redirect.target_url, "/about-us.html");
        assert_eq!(redirect.status_code, 301);
    }

    #[test]
    fn test_disabled_engine_passes() {
        let mut config = test_config();
        config.engine.enabled = false;
        let engine = RedirectEngine::new(&config, Arc::new(sample_source()));
        engine.rebuild().unwrap();

        let mut cycle = CycleState::new();
        assert_eq!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Pass(PassReason::Disabled)
        );
    }

    #[test]
    fn test_ignored_prefix_passes_case_insensitively() {
        let mut config = test_config();
        config.engine.ignore_prefixes = vec!["/api".to_string()];
        let mut source = sample_source();
        source.add_rule(item_rule("r2", "/api/about", "about-us"));
        let engine = RedirectEngine::new(&config, Arc::new(source));
        engine.rebuild().unwrap();

        let mut cycle = CycleState::new();
        assert_eq!(
            engine.handle("/API/about", None, &mut cycle),
            Outcome::Pass(PassReason::IgnoredPath)
        );
    }

    #[test]
    fn test_ignored_path_resets_cycle_counter() {
        let mut config = test_config();
        config.engine.ignore_prefixes = vec!["/admin".to_string()];
        config.cycle_protection = CycleProtectionConfig {
            enabled: true,
            max_attempts: 3,
        };
        let engine = RedirectEngine::new(&config, Arc::new(sample_source()));
        engine.rebuild().unwrap();

        let mut cycle = CycleState::from_cookie_value("2");
        assert_eq!(
            engine.handle("/admin/tools", None, &mut cycle),
            Outcome::Pass(PassReason::IgnoredPath)
        );
        assert_eq!(cycle.count(), 0);
    }

    #[test]
    fn test_miss_resets_cycle_counter() {
        let mut config = test_config();
        config.cycle_protection = CycleProtectionConfig {
            enabled: true,
            max_attempts: 3,
        };
        let engine = RedirectEngine::new(&config, Arc::new(sample_source()));
        engine.rebuild().unwrap();

        let mut cycle = CycleState::from_cookie_value("2");
        assert_eq!(
            engine.handle("/not-a-rule", None, &mut cycle),
            Outcome::Pass(PassReason::NoRule)
        );
        assert_eq!(cycle.count(), 0);
    }

    #[test]
    fn test_cycle_limit_denies_redirect() {
        let mut config = test_config();
        config.cycle_protection = CycleProtectionConfig {
            enabled: true,
            max_attempts: 2,
        };
        let engine = RedirectEngine::new(&config, Arc::new(sample_source()));
        engine.rebuild().unwrap();

        let mut cycle = CycleState::new();
        assert!(matches!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Redirect(_)
        ));
        assert!(matches!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Redirect(_)
        ));
        assert_eq!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Pass(PassReason::CycleLimit)
        );
        // The denial resets the allowance.
        assert!(matches!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Redirect(_)
        ));
    }

    #[test]
    fn test_redirect_stamps_usage() {
        let source = Arc::new(sample_source());
        let engine = RedirectEngine::new(&test_config(), source.clone());
        engine.rebuild().unwrap();

        let mut cycle = CycleState::new();
        redirect_of(engine.handle("/about", None, &mut cycle));
        drop(engine);

        assert!(source.last_used(&SourceId::from("r1")).is_some());
    }

    #[test]
    fn test_failed_rebuild_keeps_serving() {
        let source = Arc::new(sample_source());
        let engine = RedirectEngine::new(&test_config(), source.clone());
        engine.rebuild().unwrap();

        source.remove_root();
        assert!(engine.rebuild().is_err());

        let mut cycle = CycleState::new();
        assert!(matches!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Redirect(_)
        ));
    }

    #[test]
    fn test_rule_edit_patches_index() {
        let mut source = sample_source();
        source.add_item("team", item("/team.html"));
        let engine = RedirectEngine::new(&test_config(), Arc::new(source));
        engine.rebuild().unwrap();

        let edited = item_rule("r1", "/who-we-are", "team");
        engine.on_rule_changed(&edited).unwrap();

        let mut cycle = CycleState::new();
        assert_eq!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Pass(PassReason::NoRule)
        );
        let redirect = redirect_of(engine.handle("/who-we-are", None, &mut cycle));
        assert_eq!(redirect.target_url, "/team.html");
    }

    #[test]
    fn test_rule_deletion_removes_entries() {
        let engine = RedirectEngine::new(&test_config(), Arc::new(sample_source()));
        engine.rebuild().unwrap();

        let stats = engine.on_rule_deleted(&SourceId::from("r1"));
        assert_eq!(stats.total(), 0);

        let mut cycle = CycleState::new();
        assert_eq!(
            engine.handle("/about", None, &mut cycle),
            Outcome::Pass(PassReason::NoRule)
        );
    }
}
