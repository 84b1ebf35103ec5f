//! Structured logging for the notification pipeline.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for service hosts and log shippers
//!
//! # Design Notes
//!
//! - stdout is reserved for command payloads (config dumps)
//! - stderr receives all log output (human or JSONL)
//! - Each notification carries a `notification_id` for correlation

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crate targets enabled by the default filter.
const LOG_TARGETS: &[&str] = &["cn_core", "cn_config", "cert_notify"];

fn default_filter(level: LogLevel) -> EnvFilter {
    let level = LevelFilter::from(level);
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

/// Initialize the logging subsystem.
///
/// Respects `RUST_LOG` as a full filter when set; otherwise the configured
/// level applies to this workspace's targets. Returns false if a global
/// subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .is_ok()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
                    .is_ok()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init()
            .is_ok(),
    }
}

/// Generate a unique correlation id for one notification.
pub fn generate_notification_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("ntf-{}", &uuid[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_notification_id() {
        let id1 = generate_notification_id();
        let id2 = generate_notification_id();

        assert!(id1.starts_with("ntf-"));
        assert_eq!(id1.len(), 16);
        assert!(id1[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id1, id2);
    }

    #[test]
    fn default_filter_names_every_target() {
        let rendered = default_filter(LogLevel::Debug).to_string();
        for target in LOG_TARGETS {
            assert!(rendered.contains(&format!("{}=debug", target)));
        }
    }
}
