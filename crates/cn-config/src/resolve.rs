//! Configuration path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path → system path → defaults.

use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILENAME;

/// Where the config file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in the XDG config directory.
    XdgConfig,

    /// Found in /etc/cert-notify/.
    SystemConfig,

    /// No file found; built-in defaults apply.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// A discovered config file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPath {
    /// Path to notify.toml (or None if not found).
    pub path: Option<PathBuf>,

    /// Where it came from (for diagnostics).
    pub source: ConfigSource,
}

/// Environment variable naming the config file directly.
pub const ENV_CONFIG_PATH: &str = "CERT_NOTIFY_CONFIG";

/// Environment variable naming a directory that holds notify.toml.
pub const ENV_CONFIG_DIR: &str = "CERT_NOTIFY_CONFIG_DIR";

/// Application name for XDG and system directories.
const APP_NAME: &str = "cert-notify";

/// Resolve the config file path from the process environment.
///
/// 1. Explicit CLI path (if it exists)
/// 2. `CERT_NOTIFY_CONFIG`
/// 3. `CERT_NOTIFY_CONFIG_DIR` + notify.toml
/// 4. XDG config directory (~/.config/cert-notify/)
/// 5. System config (/etc/cert-notify/)
/// 6. Built-in defaults (None)
pub fn resolve_config_path(cli_path: Option<&Path>) -> ConfigPath {
    resolve_config_path_with(cli_path, |name| std::env::var(name).ok())
}

/// Same as [`resolve_config_path`] with an injectable environment lookup.
pub fn resolve_config_path_with<F>(cli_path: Option<&Path>, env: F) -> ConfigPath
where
    F: Fn(&str) -> Option<String>,
{
    // 1. CLI argument
    if let Some(path) = cli_path {
        if path.exists() {
            return found(path.to_path_buf(), ConfigSource::CliArgument);
        }
    }

    // 2. Environment variable (direct path)
    if let Some(env_path) = env(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    // 3. Environment variable (config dir)
    if let Some(config_dir) = env(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return found(path, ConfigSource::XdgConfig);
        }
    }

    // 5. System config
    let system_path = system_config_dir().join(CONFIG_FILENAME);
    if system_path.exists() {
        return found(system_path, ConfigSource::SystemConfig);
    }

    ConfigPath::default()
}

fn found(path: PathBuf, source: ConfigSource) -> ConfigPath {
    ConfigPath {
        path: Some(path),
        source,
    }
}

/// Get the XDG config directory for cert-notify.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
