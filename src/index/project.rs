use crate::index::entry::{RegexEntry, RuleEntry};
use crate::source::{ContentSource, RuleDefinition, RuleKind, RuleTarget, SourceId};
use crate::url::UrlNormalizer;
use regex::RegexBuilder;
use tracing::debug;

/// Entries produced by projecting one or more rule definitions
#[derive(Debug, Default)]
pub struct Projection {
    pub exact: Vec<RuleEntry>,
    pub prefix: Vec<RuleEntry>,
    pub regex: Vec<RegexEntry>,
}

impl Projection {
    /// Total number of entries across all three tiers
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len() + self.regex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends all entries from `other`
    pub fn merge(&mut self, other: Projection) {
        self.exact.extend(other.exact);
        self.prefix.extend(other.prefix);
        self.regex.extend(other.regex);
    }
}

/// Projects source rule definitions into index entries
///
/// Malformed or incomplete definitions (missing base, unresolvable target,
/// internal target without presentation, uncompilable regex) project to
/// nothing; they are logged and skipped, never hard errors.
pub struct Projector<'a> {
    normalizer: &'a UrlNormalizer,
    source: &'a dyn ContentSource,
    check_presentation: bool,
}

impl<'a> Projector<'a> {
    pub fn new(
        normalizer: &'a UrlNormalizer,
        source: &'a dyn ContentSource,
        check_presentation: bool,
    ) -> Self {
        Self {
            normalizer,
            source,
            check_presentation,
        }
    }

    /// Projects a full rule list (used by rebuild)
    pub fn project_all(&self, rules: &[RuleDefinition]) -> Projection {
        let mut projection = Projection::default();
        for rule in rules {
            projection.merge(self.project(rule));
        }
        projection
    }

    /// Projects a single rule definition into zero or more entries
    pub fn project(&self, rule: &RuleDefinition) -> Projection {
        let mut projection = Projection::default();

        match &rule.kind {
            RuleKind::ItemToItem {
                base,
                target,
                target_query,
            } => {
                let base = self
                    .normalizer
                    .check_page_extension(&self.normalizer.normalize(base));
                if let Some(entry) = self.rule_entry(rule, base, target, target_query) {
                    projection.exact.push(entry);
                }
            }
            RuleKind::SectionToItem {
                base,
                target,
                target_query,
            } => {
                let base = self
                    .normalizer
                    .remove_page_extension(&self.normalizer.normalize(base));
                if let Some(entry) = self.rule_entry(rule, base, target, target_query) {
                    projection.prefix.push(entry);
                }
            }
            RuleKind::SectionToSection {
                base,
                target_section,
            } => {
                self.project_section_to_section(rule, base, target_section, &mut projection);
            }
            RuleKind::Regex {
                pattern,
                replacement,
            } => {
                if let Some(entry) = self.regex_entry(rule, pattern, replacement) {
                    projection.regex.push(entry);
                }
            }
        }

        projection
    }

    /// Builds an exact/prefix entry once base and target both resolve
    fn rule_entry(
        &self,
        rule: &RuleDefinition,
        base: String,
        target: &RuleTarget,
        target_query: &Option<String>,
    ) -> Option<RuleEntry> {
        if base.is_empty() {
            debug!(rule = %rule.id, "skipping rule: empty base");
            return None;
        }

        let (target, external) = self.resolve_target(rule, target)?;

        Some(RuleEntry {
            source_id: rule.id.clone(),
            base,
            target,
            target_query: target_query.clone(),
            external,
            status_code: rule.status_code,
        })
    }

    /// Resolves a rule target to (url, is_external)
    ///
    /// The presentation check applies to internal targets only; an external
    /// URL has no presentation to consult.
    fn resolve_target(&self, rule: &RuleDefinition, target: &RuleTarget) -> Option<(String, bool)> {
        match target {
            RuleTarget::External { url } => {
                if url.is_empty() {
                    debug!(rule = %rule.id, "skipping rule: empty external target");
                    return None;
                }
                Some((url.clone(), true))
            }
            RuleTarget::Internal { item } => {
                if self.check_presentation && !self.source.has_presentation(item) {
                    debug!(rule = %rule.id, item = %item, "skipping rule: target has no presentation");
                    return None;
                }
                match self.source.canonical_url(item) {
                    Some(url) if !url.is_empty() => Some((url, false)),
                    _ => {
                        debug!(rule = %rule.id, item = %item, "skipping rule: unresolvable target");
                        None
                    }
                }
            }
        }
    }

    /// Section→Section expansion: one prefix entry for the section mapping,
    /// one exact entry for the section itself, and one exact entry per
    /// descendant page of the target section
    fn project_section_to_section(
        &self,
        rule: &RuleDefinition,
        base: &str,
        target_section: &SourceId,
        projection: &mut Projection,
    ) {
        let base_norm = self.normalizer.normalize(base);
        if base_norm.is_empty() {
            debug!(rule = %rule.id, "skipping section rule: empty base");
            return;
        }

        let target_url = match self.source.canonical_url(target_section) {
            Some(url) if !url.is_empty() => url,
            _ => {
                debug!(rule = %rule.id, section = %target_section, "skipping section rule: unresolvable target section");
                return;
            }
        };

        if !self.check_presentation || self.source.has_presentation(target_section) {
            projection.prefix.push(RuleEntry {
                source_id: rule.id.clone(),
                base: base_norm.clone(),
                target: target_url.clone(),
                target_query: None,
                external: false,
                status_code: rule.status_code,
            });
            projection.exact.push(RuleEntry {
                source_id: rule.id.clone(),
                base: self.normalizer.check_page_extension(&base_norm),
                target: target_url.clone(),
                target_query: None,
                external: false,
                status_code: rule.status_code,
            });
        }

        // Descendant bases substitute the target-section prefix with the
        // base prefix; a site-root target concatenates instead.
        let target_prefix = self.normalizer.remove_page_extension(&target_url);
        for descendant in self.source.descendants(target_section) {
            if self.check_presentation && !self.source.has_presentation(&descendant) {
                continue;
            }

            let descendant_url = match self.source.canonical_url(&descendant) {
                Some(url) if !url.is_empty() => url,
                _ => continue,
            };

            let descendant_base = if target_prefix == "/" {
                format!("{}{}", base_norm, descendant_url)
            } else {
                descendant_url.replace(&target_prefix, &base_norm)
            };
            if descendant_base.is_empty() {
                continue;
            }

            projection.exact.push(RuleEntry {
                source_id: rule.id.clone(),
                base: descendant_base,
                target: descendant_url,
                target_query: None,
                external: false,
                status_code: rule.status_code,
            });
        }
    }

    /// Compiles a regex rule; a malformed pattern or replacement drops this
    /// single entry, others proceed
    fn regex_entry(
        &self,
        rule: &RuleDefinition,
        pattern: &str,
        replacement: &str,
    ) -> Option<RegexEntry> {
        if pattern.is_empty() || replacement.is_empty() {
            debug!(rule = %rule.id, "skipping regex rule: empty pattern or replacement");
            return None;
        }

        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                debug!(rule = %rule.id, error = %e, "dropping regex rule: pattern failed to compile");
                return None;
            }
        };

        // The replacement field must also be a valid pattern before its text
        // is used as the substitution value.
        if let Err(e) = RegexBuilder::new(replacement).case_insensitive(true).build() {
            debug!(rule = %rule.id, error = %e, "dropping regex rule: replacement failed to compile");
            return None;
        }

        Some(RegexEntry {
            source_id: rule.id.clone(),
            pattern: compiled,
            replacement: replacement.to_string(),
            status_code: rule.status_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::source::{ItemRecord, MemorySource};

    fn normalizer() -> UrlNormalizer {
        UrlNormalizer::new(&SiteConfig {
            virtual_folder: String::new(),
            start_item: "/home".to_string(),
            page_extension: ".html".to_string(),
        })
    }

    fn item(url: &str, presentation: bool, children: &[&str]) -> ItemRecord {
        ItemRecord {
            url: url.to_string(),
            presentation,
            children: children.iter().map(|c| SourceId::from(*c)).collect(),
        }
    }

    fn rule(id: &str, kind: RuleKind, status_code: u16) -> RuleDefinition {
        RuleDefinition {
            id: SourceId::from(id),
            kind,
            status_code,
        }
    }

    #[test]
    fn test_item_to_item_projection() {
        let mut source = MemorySource::new();
        source.add_item("about-us", item("/about us.html", true, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::ItemToItem {
                base: "/About".to_string(),
                target: RuleTarget::Internal {
                    item: SourceId::from("about-us"),
                },
                target_query: None,
            },
            301,
        ));

        assert_eq!(projection.exact.len(), 1);
        assert!(projection.prefix.is_empty());
        let entry = &projection.exact[0];
        assert_eq!(entry.base, "/about.html");
        assert_eq!(entry.target, "/about us.html");
        assert!(!entry.external);
        assert_eq!(entry.status_code, 301);
    }

    #[test]
    fn test_item_to_item_external_target() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, true);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::ItemToItem {
                base: "/gone".to_string(),
                target: RuleTarget::External {
                    url: "https://example.org/new".to_string(),
                },
                target_query: Some("ref=1".to_string()),
            },
            0,
        ));

        // External targets project even with the presentation check enabled.
        assert_eq!(projection.exact.len(), 1);
        assert!(projection.exact[0].external);
        assert_eq!(projection.exact[0].target_query.as_deref(), Some("ref=1"));
    }

    #[test]
    fn test_empty_base_skipped() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::ItemToItem {
                base: String::new(),
                target: RuleTarget::External {
                    url: "https://example.org".to_string(),
                },
                target_query: None,
            },
            0,
        ));

        assert!(projection.is_empty());
    }

    #[test]
    fn test_unresolvable_internal_target_skipped() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::ItemToItem {
                base: "/old".to_string(),
                target: RuleTarget::Internal {
                    item: SourceId::from("ghost"),
                },
                target_query: None,
            },
            0,
        ));

        assert!(projection.is_empty());
    }

    #[test]
    fn test_presentation_check_skips_internal_target() {
        let mut source = MemorySource::new();
        source.add_item("blank", item("/blank.html", false, &[]));
        let n = normalizer();

        let r = rule(
            "r1",
            RuleKind::ItemToItem {
                base: "/old".to_string(),
                target: RuleTarget::Internal {
                    item: SourceId::from("blank"),
                },
                target_query: None,
            },
            0,
        );

        let checking = Projector::new(&n, &source, true);
        assert!(checking.project(&r).is_empty());

        let lenient = Projector::new(&n, &source, false);
        assert_eq!(lenient.project(&r).exact.len(), 1);
    }

    #[test]
    fn test_section_to_item_projection() {
        let mut source = MemorySource::new();
        source.add_item("landing", item("/landing.html", true, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::SectionToItem {
                base: "/old-section".to_string(),
                target: RuleTarget::Internal {
                    item: SourceId::from("landing"),
                },
                target_query: None,
            },
            0,
        ));

        assert_eq!(projection.prefix.len(), 1);
        assert!(projection.exact.is_empty());
        // Prefix bases are extension-stripped and decoded.
        assert_eq!(projection.prefix[0].base, "/old section");
    }

    #[test]
    fn test_section_to_section_expansion() {
        let mut source = MemorySource::new();
        source.add_item("news", item("/news.html", true, &["n1", "n2"]));
        source.add_item("n1", item("/news/2023.html", true, &[]));
        source.add_item("n2", item("/news/2024.html", true, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::SectionToSection {
                base: "/archive".to_string(),
                target_section: SourceId::from("news"),
            },
            0,
        ));

        // One prefix mapping plus the section-self exact entry plus one
        // exact entry per descendant.
        assert_eq!(projection.prefix.len(), 1);
        assert_eq!(projection.exact.len(), 3);

        assert_eq!(projection.prefix[0].base, "/archive");
        assert_eq!(projection.prefix[0].target, "/news.html");

        let self_entry = &projection.exact[0];
        assert_eq!(self_entry.base, "/archive.html");
        assert_eq!(self_entry.target, "/news.html");

        let mut descendant_bases: Vec<&str> = projection.exact[1..]
            .iter()
            .map(|e| e.base.as_str())
            .collect();
        descendant_bases.sort();
        assert_eq!(
            descendant_bases,
            vec!["/archive/2023.html", "/archive/2024.html"]
        );
    }

    #[test]
    fn test_section_to_section_site_root_target() {
        let mut source = MemorySource::new();
        source.add_item("root", item("/", true, &["p"]));
        source.add_item("p", item("/page.html", true, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::SectionToSection {
                base: "/legacy".to_string(),
                target_section: SourceId::from("root"),
            },
            0,
        ));

        // Root target concatenates instead of substituting.
        let descendant = projection
            .exact
            .iter()
            .find(|e| e.target == "/page.html")
            .unwrap();
        assert_eq!(descendant.base, "/legacy/page.html");
    }

    #[test]
    fn test_section_descendants_without_presentation_excluded() {
        let mut source = MemorySource::new();
        source.add_item("news", item("/news.html", true, &["shown", "hidden"]));
        source.add_item("shown", item("/news/shown.html", true, &[]));
        source.add_item("hidden", item("/news/hidden.html", false, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, true);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::SectionToSection {
                base: "/archive".to_string(),
                target_section: SourceId::from("news"),
            },
            0,
        ));

        assert!(projection
            .exact
            .iter()
            .all(|e| e.target != "/news/hidden.html"));
        assert!(projection
            .exact
            .iter()
            .any(|e| e.target == "/news/shown.html"));
    }

    #[test]
    fn test_regex_projection() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::Regex {
                pattern: r"^/old(/.*)?$".to_string(),
                replacement: "/new".to_string(),
            },
            307,
        ));

        assert_eq!(projection.regex.len(), 1);
        let entry = &projection.regex[0];
        assert!(entry.pattern.is_match("/OLD/page"));
        assert_eq!(entry.replacement, "/new");
        assert_eq!(entry.status_code, 307);
    }

    #[test]
    fn test_malformed_regex_dropped() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let projection = projector.project(&rule(
            "r1",
            RuleKind::Regex {
                pattern: "(unclosed".to_string(),
                replacement: "/new".to_string(),
            },
            0,
        ));

        assert!(projection.is_empty());
    }

    #[test]
    fn test_empty_regex_fields_dropped() {
        let source = MemorySource::new();
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        for (pattern, replacement) in [("", "/new"), ("^/old$", "")] {
            let projection = projector.project(&rule(
                "r1",
                RuleKind::Regex {
                    pattern: pattern.to_string(),
                    replacement: replacement.to_string(),
                },
                0,
            ));
            assert!(projection.is_empty());
        }
    }

    #[test]
    fn test_project_all_merges() {
        let mut source = MemorySource::new();
        source.add_item("a", item("/a.html", true, &[]));
        let n = normalizer();
        let projector = Projector::new(&n, &source, false);

        let rules = vec![
            rule(
                "r1",
                RuleKind::ItemToItem {
                    base: "/one".to_string(),
                    target: RuleTarget::Internal {
                        item: SourceId::from("a"),
                    },
                    target_query: None,
                },
                0,
            ),
            rule(
                "r2",
                RuleKind::Regex {
                    pattern: "^/two$".to_string(),
                    replacement: "/a".to_string(),
                },
                0,
            ),
        ];

        let projection = projector.project_all(&rules);
        assert_eq!(projection.exact.len(), 1);
        assert_eq!(projection.regex.len(), 1);
        assert_eq!(projection.len(), 2);
    }
}
