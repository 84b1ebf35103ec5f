//! Structured event vocabulary for diagnostic logging.
//!
//! Every notification runs inside a span carrying `notification_id`; the
//! `stage` field and the `event` names below make the JSONL stream
//! filterable without parsing messages.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Steps of one certificate notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration loading.
    Init,
    /// Exit-event dispatch from the host.
    Dispatch,
    /// Writing the certificate to a transient file.
    Stage,
    /// Building the command line and starting the helper.
    Launch,
    /// Bounded wait for the helper.
    Wait,
    /// Emitting the outcome record.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Dispatch => "dispatch",
            Stage::Stage => "stage",
            Stage::Launch => "launch",
            Stage::Wait => "wait",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    pub const EVENT_RECEIVED: &str = "exit.event_received";
    pub const EVENT_IGNORED: &str = "exit.event_ignored";

    pub const NOTIFY_STARTED: &str = "notify.started";
    pub const NOTIFY_FINISHED: &str = "notify.finished";
    pub const NOTIFY_NOT_CONFIGURED: &str = "notify.not_configured";

    pub const TEMP_FILE_WRITTEN: &str = "temp_file.written";
    pub const TEMP_FILE_PRESERVED: &str = "temp_file.preserved";
    pub const TEMP_FILE_DELETE_FAILED: &str = "temp_file.delete_failed";

    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_START_FAILED: &str = "process.start_failed";
    pub const PROCESS_EXITED: &str = "process.exited";
    pub const PROCESS_TIMED_OUT: &str = "process.timed_out";
    pub const PROCESS_WAIT_FAILED: &str = "process.wait_failed";

    pub const SINK_FAILED: &str = "report.sink_failed";
}
