use crate::config::types::{Config, CycleProtectionConfig, EngineConfig, SiteConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_cycle_protection_config(&config.cycle_protection)?;
    validate_site_config(&config.site)?;
    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if !(300..=399).contains(&config.default_status_code) {
        return Err(ConfigError::Validation(format!(
            "default_status_code must be a redirect code (300-399), got {}",
            config.default_status_code
        )));
    }

    for prefix in &config.ignore_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "ignore prefix must start with '/', got '{}'",
                prefix
            )));
        }
    }

    Ok(())
}

/// Validates cycle protection configuration
fn validate_cycle_protection_config(config: &CycleProtectionConfig) -> Result<(), ConfigError> {
    if config.enabled && config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1 when cycle protection is enabled, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if !config.virtual_folder.is_empty() {
        if !config.virtual_folder.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "virtual_folder must start with '/', got '{}'",
                config.virtual_folder
            )));
        }

        if config.virtual_folder.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "virtual_folder must not end with '/', got '{}'",
                config.virtual_folder
            )));
        }
    }

    if !config.start_item.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "start_item must start with '/', got '{}'",
            config.start_item
        )));
    }

    if !config.page_extension.starts_with('.') || config.page_extension.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "page_extension must start with '.' and name an extension, got '{}'",
            config.page_extension
        )));
    }

    Ok(())
}
