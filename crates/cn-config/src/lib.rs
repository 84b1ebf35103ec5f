//! Certificate notification configuration loading and validation.
//!
//! This crate provides:
//! - The immutable [`NotificationConfig`] snapshot consumed by the event processor
//! - TOML loading with lenient optional values
//! - Config path resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation

pub mod config;
pub mod resolve;
pub mod validate;

pub use config::{
    load_config, parse_config, parse_config_with_warnings, ConfigError, ConfigWarning,
    NotificationConfig, CONFIG_FILENAME, DEFAULT_PROCESS_TIMEOUT_MS,
};
pub use resolve::{resolve_config_path, resolve_config_path_with, ConfigPath, ConfigSource};
pub use validate::{validate, IssueSeverity, ValidationIssue, ValidationReport};

use std::path::Path;

/// A loaded config together with where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: NotificationConfig,
    pub location: ConfigPath,
}

/// Resolve the config path and load it.
///
/// A missing file yields the default snapshot (no helper configured).
pub fn load_resolved_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let location = resolve_config_path(cli_path);
    let config = match &location.path {
        Some(path) => load_config(path)?,
        None => NotificationConfig::default(),
    };
    tracing::debug!(
        source = %location.source,
        configured = config.is_configured(),
        "configuration loaded"
    );
    Ok(ResolvedConfig { config, location })
}
