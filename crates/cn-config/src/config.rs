//! The notification configuration snapshot and its TOML loader.
//!
//! Only `executable_path` is strict: a value of the wrong type fails the load.
//! Every other key is optional, and a malformed optional value falls back to
//! its default with a logged warning instead of failing the load.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Timeout applied to the helper process when none is configured.
pub const DEFAULT_PROCESS_TIMEOUT_MS: u64 = 10_000;

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "notify.toml";

/// Errors raised while loading a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{field} must be a {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
}

impl From<ConfigError> for cn_common::Error {
    fn from(err: ConfigError) -> Self {
        cn_common::Error::InvalidConfig(err.to_string())
    }
}

/// Immutable configuration for the event processor.
///
/// Loaded once at startup and passed by value to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationConfig {
    /// Helper executable. `None` means no helper is configured.
    pub executable_path: Option<PathBuf>,
    /// Fixed arguments placed before the per-event arguments.
    pub arguments: Vec<String>,
    /// Wrap the dynamic arguments in single quotes for quote-sensitive shells.
    pub escape_for_shell: bool,
    /// How long to wait for the helper before giving up on it.
    pub process_timeout_ms: u64,
    /// Directory for transient certificate files. `None` means the platform temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            executable_path: None,
            arguments: Vec::new(),
            escape_for_shell: false,
            process_timeout_ms: DEFAULT_PROCESS_TIMEOUT_MS,
            temp_dir: None,
        }
    }
}

impl NotificationConfig {
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn with_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_escape_for_shell(mut self, enabled: bool) -> Self {
        self.escape_for_shell = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// True when a helper executable is configured.
    pub fn is_configured(&self) -> bool {
        self.executable_path.is_some()
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    /// Directory transient files are created in.
    pub fn effective_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// A non-fatal problem found while loading an optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Parse config text, returning the snapshot and any fallback warnings.
pub fn parse_config_with_warnings(
    content: &str,
    path: &Path,
) -> Result<(NotificationConfig, Vec<ConfigWarning>), ConfigError> {
    let table = content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

    let mut config = NotificationConfig::default();
    let mut warnings = Vec::new();

    for (key, value) in &table {
        match key.as_str() {
            "executable_path" => {
                config.executable_path = match value {
                    toml::Value::String(s) if s.trim().is_empty() => None,
                    toml::Value::String(s) => Some(PathBuf::from(s)),
                    _ => {
                        return Err(ConfigError::InvalidType {
                            field: "executable_path",
                            expected: "string",
                        })
                    }
                };
            }
            "arguments" => match parse_arguments(value) {
                Some(args) => config.arguments = args,
                None => warnings.push(ConfigWarning {
                    field: "arguments",
                    message: "expected a string or an array of strings; using no arguments"
                        .to_string(),
                }),
            },
            "escape_for_shell" => match value {
                toml::Value::Boolean(b) => config.escape_for_shell = *b,
                toml::Value::Integer(i) => config.escape_for_shell = *i != 0,
                _ => warnings.push(ConfigWarning {
                    field: "escape_for_shell",
                    message: "expected a boolean or integer; escaping disabled".to_string(),
                }),
            },
            "process_timeout_ms" => match value {
                toml::Value::Integer(i) if *i > 0 => config.process_timeout_ms = *i as u64,
                _ => warnings.push(ConfigWarning {
                    field: "process_timeout_ms",
                    message: format!(
                        "expected a positive integer; using {}",
                        DEFAULT_PROCESS_TIMEOUT_MS
                    ),
                }),
            },
            "temp_dir" => match value {
                toml::Value::String(s) if !s.trim().is_empty() => {
                    config.temp_dir = Some(PathBuf::from(s))
                }
                _ => warnings.push(ConfigWarning {
                    field: "temp_dir",
                    message: "expected a non-empty string; using the platform temp dir"
                        .to_string(),
                }),
            },
            other => debug!(key = other, "ignoring unknown config key"),
        }
    }

    Ok((config, warnings))
}

fn parse_arguments(value: &toml::Value) -> Option<Vec<String>> {
    match value {
        toml::Value::String(s) => Some(vec![s.clone()]),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Parse config text. Fallback warnings are logged.
pub fn parse_config(content: &str, path: &Path) -> Result<NotificationConfig, ConfigError> {
    let (config, warnings) = parse_config_with_warnings(content, path)?;
    for warning in &warnings {
        warn!(path = %path.display(), field = warning.field, "{}", warning.message);
    }
    Ok(config)
}

/// Load the config file at `path`, returning the default snapshot if it does not exist.
pub fn load_config(path: &Path) -> Result<NotificationConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(NotificationConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}
