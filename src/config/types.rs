use serde::Deserialize;

/// Main configuration structure for Reroute
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(rename = "cycle-protection", default)]
    pub cycle_protection: CycleProtectionConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Whether the redirect engine is active at all
    pub enabled: bool,

    /// Status code used when a matched rule carries code 0
    #[serde(rename = "default-status-code")]
    pub default_status_code: u16,

    /// Drop candidate entries whose base (or pattern) already exists
    #[serde(rename = "check-duplicates", default)]
    pub check_duplicates: bool,

    /// Only project rules whose internal target has renderable presentation
    #[serde(rename = "check-presentation", default)]
    pub check_presentation: bool,

    /// Rebuild all indices on every rule edit instead of patching
    #[serde(rename = "rebuild-on-edit", default)]
    pub rebuild_on_edit: bool,

    /// Request-path prefixes that are never redirected
    #[serde(rename = "ignore-prefixes", default)]
    pub ignore_prefixes: Vec<String>,
}

/// Cycle protection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CycleProtectionConfig {
    /// Whether consecutive-redirect limiting is active
    #[serde(default)]
    pub enabled: bool,

    /// Consecutive redirects admitted for one client before a hard stop
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for CycleProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
        }
    }
}

/// Site context configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Virtual folder prefix stripped during normalization and re-applied
    /// to internal targets ("" or "/folder", no trailing slash)
    #[serde(rename = "virtual-folder", default)]
    pub virtual_folder: String,

    /// Site start item prefix stripped during normalization
    #[serde(rename = "start-item")]
    pub start_item: String,

    /// Page extension token appended to exact-tier comparands
    #[serde(rename = "page-extension", default = "default_page_extension")]
    pub page_extension: String,
}

fn default_page_extension() -> String {
    ".html".to_string()
}

/// Rule source configuration (CLI file-backed source)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    /// Path to the TOML rules file
    #[serde(default)]
    pub path: String,
}
