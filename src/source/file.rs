use crate::source::{
    ContentSource, ItemRecord, MemorySource, RuleDefinition, RuleKind, RuleTarget, SourceError,
    SourceId, SourceResult,
};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// TOML rules file schema
#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    item: Vec<ItemSpec>,
    #[serde(default)]
    rule: Vec<RuleSpec>,
}

/// A content item declared in the rules file
#[derive(Debug, Deserialize)]
struct ItemSpec {
    id: String,
    url: String,
    #[serde(default = "default_presentation")]
    presentation: bool,
    #[serde(default)]
    children: Vec<String>,
}

fn default_presentation() -> bool {
    true
}

/// A rule declared in the rules file
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RuleSpec {
    ItemToItem {
        id: String,
        base: String,
        #[serde(flatten)]
        target: TargetSpec,
        #[serde(rename = "status-code", default)]
        status_code: u16,
    },
    SectionToItem {
        id: String,
        base: String,
        #[serde(flatten)]
        target: TargetSpec,
        #[serde(rename = "status-code", default)]
        status_code: u16,
    },
    SectionToSection {
        id: String,
        base: String,
        #[serde(rename = "target-section")]
        target_section: String,
        #[serde(rename = "status-code", default)]
        status_code: u16,
    },
    Regex {
        id: String,
        pattern: String,
        replacement: String,
        #[serde(rename = "status-code", default)]
        status_code: u16,
    },
}

/// Target fields shared by item and section rules: exactly one of
/// `target-item` / `target-url` must be present
#[derive(Debug, Deserialize)]
struct TargetSpec {
    #[serde(rename = "target-item")]
    target_item: Option<String>,
    #[serde(rename = "target-url")]
    target_url: Option<String>,
    #[serde(rename = "query-string")]
    query_string: Option<String>,
}

impl TargetSpec {
    fn into_target(self, rule_id: &str) -> SourceResult<(RuleTarget, Option<String>)> {
        let target = match (self.target_item, self.target_url) {
            (Some(item), None) => RuleTarget::Internal {
                item: SourceId::new(item),
            },
            (None, Some(url)) => RuleTarget::External { url },
            (Some(_), Some(_)) => {
                return Err(SourceError::Validation(format!(
                    "rule '{}' declares both target-item and target-url",
                    rule_id
                )))
            }
            (None, None) => {
                return Err(SourceError::Validation(format!(
                    "rule '{}' declares neither target-item nor target-url",
                    rule_id
                )))
            }
        };
        Ok((target, self.query_string))
    }
}

/// Loads a TOML rules file into a [`MemorySource`]
///
/// # Arguments
///
/// * `path` - Path to the rules file (`[[item]]` and `[[rule]]` tables)
///
/// # Returns
///
/// * `Ok(MemorySource)` - Items and rules loaded and cross-checked
/// * `Err(SourceError)` - Read, parse, or reference failure
pub fn load_rules(path: &Path) -> SourceResult<MemorySource> {
    let content = std::fs::read_to_string(path)?;
    let file: RulesFile = toml::from_str(&content)?;

    let mut source = MemorySource::new();

    for item in file.item {
        source.add_item(
            SourceId::new(item.id),
            ItemRecord {
                url: item.url,
                presentation: item.presentation,
                children: item.children.into_iter().map(SourceId::new).collect(),
            },
        );
    }

    for rule in file.rule {
        source.add_rule(convert_rule(rule, &source)?);
    }

    Ok(source)
}

/// Converts a file-schema rule into the engine's rule model
fn convert_rule(spec: RuleSpec, source: &MemorySource) -> SourceResult<RuleDefinition> {
    let rule = match spec {
        RuleSpec::ItemToItem {
            id,
            base,
            target,
            status_code,
        } => {
            let (target, target_query) = target.into_target(&id)?;
            check_internal_target(&target, source)?;
            RuleDefinition {
                id: SourceId::new(id),
                kind: RuleKind::ItemToItem {
                    base,
                    target,
                    target_query,
                },
                status_code,
            }
        }
        RuleSpec::SectionToItem {
            id,
            base,
            target,
            status_code,
        } => {
            let (target, target_query) = target.into_target(&id)?;
            check_internal_target(&target, source)?;
            RuleDefinition {
                id: SourceId::new(id),
                kind: RuleKind::SectionToItem {
                    base,
                    target,
                    target_query,
                },
                status_code,
            }
        }
        RuleSpec::SectionToSection {
            id,
            base,
            target_section,
            status_code,
        } => {
            let section = SourceId::new(target_section);
            if source.canonical_url(&section).is_none() {
                return Err(SourceError::UnknownItem(section.to_string()));
            }
            RuleDefinition {
                id: SourceId::new(id),
                kind: RuleKind::SectionToSection {
                    base,
                    target_section: section,
                },
                status_code,
            }
        }
        RuleSpec::Regex {
            id,
            pattern,
            replacement,
            status_code,
        } => RuleDefinition {
            id: SourceId::new(id),
            kind: RuleKind::Regex {
                pattern,
                replacement,
            },
            status_code,
        },
    };

    Ok(rule)
}

fn check_internal_target(target: &RuleTarget, source: &MemorySource) -> SourceResult<()> {
    if let RuleTarget::Internal { item } = target {
        if source.canonical_url(item).is_none() {
            return Err(SourceError::UnknownItem(item.to_string()));
        }
    }
    Ok(())
}

/// File-backed rule source that can reload itself in place
///
/// The CLI watch mode holds one `FileSource` for the process lifetime and
/// calls [`reload`](Self::reload) when the file changes on disk; readers of
/// the [`ContentSource`] interface always see a complete generation. A
/// failed reload keeps the previous one.
pub struct FileSource {
    path: PathBuf,
    inner: ArcSwap<MemorySource>,
}

impl FileSource {
    /// Loads the rules file at `path`
    pub fn load(path: impl Into<PathBuf>) -> SourceResult<Self> {
        let path = path.into();
        let inner = ArcSwap::from_pointee(load_rules(&path)?);
        Ok(Self { path, inner })
    }

    /// Re-reads the rules file and swaps in the new generation
    pub fn reload(&self) -> SourceResult<()> {
        self.inner.store(Arc::new(load_rules(&self.path)?));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn rules(&self) -> SourceResult<Vec<RuleDefinition>> {
        self.inner.load().rules()
    }

    fn canonical_url(&self, item: &SourceId) -> Option<String> {
        self.inner.load().canonical_url(item)
    }

    fn has_presentation(&self, item: &SourceId) -> bool {
        self.inner.load().has_presentation(item)
    }

    fn descendants(&self, item: &SourceId) -> Vec<SourceId> {
        self.inner.load().descendants(item)
    }

    fn record_use(&self, rule: &SourceId, when: DateTime<Utc>) -> SourceResult<()> {
        self.inner.load().record_use(rule, when)
    }
}
