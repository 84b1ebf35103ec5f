//! Error types for certificate notification.
//!
//! Every failure the pipeline can produce is a variant of [`Error`], with:
//! - A stable numeric code for status reporting
//! - A category for grouping
//! - A short headline and a remediation hint for operators
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Helper Not Configured
//!   Reason: no notification executable is configured
//!   Fix: Set 'executable_path' in notify.toml ...
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed configuration.
    Config,
    /// Memory and buffer allocation.
    Resource,
    /// Transient file I/O.
    Io,
    /// Helper process launch, wait, and exit status.
    Process,
    /// Programmer misuse of a one-shot object.
    Usage,
    /// Properties supplied by the certificate authority.
    Host,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Process => write!(f, "process"),
            ErrorCategory::Usage => write!(f, "usage"),
            ErrorCategory::Host => write!(f, "host"),
        }
    }
}

/// Unified error type for the notification pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("no notification executable is configured")]
    ConfigurationMissing,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Resource errors (20-29)
    #[error("failed to allocate buffer of {requested} elements")]
    AllocationFailure { requested: usize },

    // I/O errors (30-39)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("range {offset}+{count} is outside a buffer of {len} bytes")]
    InvalidRange {
        offset: usize,
        count: usize,
        len: usize,
    },

    // Process errors (40-49)
    #[error("failed to launch process: {0}")]
    LaunchFailed(#[source] std::io::Error),

    #[error("wait for process was abandoned")]
    WaitAbandoned,

    #[error("process still running after {timeout:?}")]
    WaitTimedOut { timeout: Duration },

    #[error("failed to wait for process: {0}")]
    WaitFailed(#[source] std::io::Error),

    #[error("exit code unavailable: {0}")]
    ExitCodeUnavailable(String),

    #[error("command line of {length} characters exceeds the {max} character limit")]
    CommandLineTooLong { length: usize, max: usize },

    // Usage errors (50-59)
    #[error("already initialized")]
    AlreadyInitialized,

    #[error("process already created")]
    AlreadyRunning,

    #[error("file is not open")]
    NotOpen,

    #[error("process has not been started or waited on")]
    NotStarted,

    // Host property errors (60-69)
    #[error("property {name} is not set")]
    PropertyMissing { name: String },

    #[error("property {name} is not of type {expected}")]
    PropertyType { name: String, expected: String },
}

impl Error {
    /// Returns the stable error code for this error.
    ///
    /// - 10-19: Configuration errors
    /// - 20-29: Resource errors
    /// - 30-39: I/O errors
    /// - 40-49: Process errors
    /// - 50-59: Usage errors
    /// - 60-69: Host property errors
    pub fn code(&self) -> u32 {
        match self {
            Error::ConfigurationMissing => 10,
            Error::InvalidConfig(_) => 11,
            Error::AllocationFailure { .. } => 20,
            Error::Io(_) => 30,
            Error::InvalidRange { .. } => 31,
            Error::LaunchFailed(_) => 40,
            Error::WaitAbandoned => 41,
            Error::WaitTimedOut { .. } => 42,
            Error::WaitFailed(_) => 43,
            Error::ExitCodeUnavailable(_) => 44,
            Error::CommandLineTooLong { .. } => 45,
            Error::AlreadyInitialized => 50,
            Error::AlreadyRunning => 51,
            Error::NotOpen => 52,
            Error::NotStarted => 53,
            Error::PropertyMissing { .. } => 60,
            Error::PropertyType { .. } => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConfigurationMissing | Error::InvalidConfig(_) => ErrorCategory::Config,

            Error::AllocationFailure { .. } => ErrorCategory::Resource,

            Error::Io(_) | Error::InvalidRange { .. } => ErrorCategory::Io,

            Error::LaunchFailed(_)
            | Error::WaitAbandoned
            | Error::WaitTimedOut { .. }
            | Error::WaitFailed(_)
            | Error::ExitCodeUnavailable(_)
            | Error::CommandLineTooLong { .. } => ErrorCategory::Process,

            Error::AlreadyInitialized
            | Error::AlreadyRunning
            | Error::NotOpen
            | Error::NotStarted => ErrorCategory::Usage,

            Error::PropertyMissing { .. } | Error::PropertyType { .. } => ErrorCategory::Host,
        }
    }

    /// Raw OS error number, when the failure came from the operating system.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) | Error::LaunchFailed(e) | Error::WaitFailed(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Whether this error is the bounded wait expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::WaitTimedOut { .. })
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::ConfigurationMissing => {
                "Set 'executable_path' in notify.toml, or point CERT_NOTIFY_CONFIG at a config file."
            }
            Error::InvalidConfig(_) => {
                "Run 'cert-notify config check' to see which value is malformed."
            }
            Error::AllocationFailure { .. } => {
                "The host is out of memory. Retry once memory pressure has eased."
            }
            Error::Io(_) => {
                "Check free space and permissions on the temp directory, then retry."
            }
            Error::InvalidRange { .. } => "Internal misuse of the transient file. Report as a bug.",
            Error::LaunchFailed(_) => {
                "Verify the configured executable exists and is runnable by the service account."
            }
            Error::WaitAbandoned | Error::WaitFailed(_) => {
                "The helper's status could not be observed. Check whether it is still running."
            }
            Error::WaitTimedOut { .. } => {
                "The helper is still running and was not killed. Raise 'process_timeout_ms' or speed up the helper."
            }
            Error::ExitCodeUnavailable(_) => {
                "The helper ended abnormally. Inspect the preserved temp file and the helper's own logs."
            }
            Error::CommandLineTooLong { .. } => {
                "Shorten the configured arguments or the temp directory path."
            }
            Error::AlreadyInitialized
            | Error::AlreadyRunning
            | Error::NotOpen
            | Error::NotStarted => "Internal sequencing error. Report as a bug.",
            Error::PropertyMissing { .. } | Error::PropertyType { .. } => {
                "The certificate authority did not supply the expected certificate property."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::ConfigurationMissing => "Helper Not Configured",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::AllocationFailure { .. } => "Allocation Failure",
            Error::Io(_) => "I/O Error",
            Error::InvalidRange { .. } => "Invalid Write Range",
            Error::LaunchFailed(_) => "Helper Launch Failed",
            Error::WaitAbandoned => "Wait Abandoned",
            Error::WaitTimedOut { .. } => "Helper Timed Out",
            Error::WaitFailed(_) => "Wait Failed",
            Error::ExitCodeUnavailable(_) => "Exit Code Unavailable",
            Error::CommandLineTooLong { .. } => "Command Line Too Long",
            Error::AlreadyInitialized => "Already Initialized",
            Error::AlreadyRunning => "Already Running",
            Error::NotOpen => "File Not Open",
            Error::NotStarted => "Process Not Started",
            Error::PropertyMissing { .. } => "Missing Certificate Property",
            Error::PropertyType { .. } => "Unexpected Property Type",
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::ConfigurationMissing.code(), 10);
        assert_eq!(Error::AllocationFailure { requested: 8 }.code(), 20);
        assert_eq!(
            Error::WaitTimedOut {
                timeout: Duration::from_secs(10)
            }
            .code(),
            42
        );
        assert_eq!(Error::AlreadyRunning.code(), 51);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::ConfigurationMissing.category(), ErrorCategory::Config);
        assert_eq!(Error::WaitAbandoned.category(), ErrorCategory::Process);
        assert_eq!(Error::NotOpen.category(), ErrorCategory::Usage);
        assert_eq!(
            Error::PropertyMissing {
                name: "SerialNumber".into()
            }
            .category(),
            ErrorCategory::Host
        );
    }

    #[test]
    fn test_os_error_passthrough() {
        let err = Error::LaunchFailed(io::Error::from_raw_os_error(2));
        assert_eq!(err.os_error(), Some(2));

        let err = Error::Io(io::Error::new(io::ErrorKind::Other, "synthetic"));
        assert_eq!(err.os_error(), None);

        assert_eq!(Error::ConfigurationMissing.os_error(), None);
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::WaitTimedOut {
            timeout: Duration::from_millis(5)
        }
        .is_timeout());
        assert!(!Error::WaitAbandoned.is_timeout());
    }

    #[test]
    fn test_command_line_too_long_message() {
        let err = Error::CommandLineTooLong {
            length: 40000,
            max: 32768,
        };
        assert_eq!(
            err.to_string(),
            "command line of 40000 characters exceeds the 32768 character limit"
        );
    }

    #[test]
    fn test_format_error_human() {
        let formatted = format_error_human(&Error::ConfigurationMissing, false);

        assert!(formatted.contains("Helper Not Configured"));
        assert!(formatted.contains("no notification executable is configured"));
        assert!(formatted.contains("executable_path"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Config.to_string(), "config");
        assert_eq!(ErrorCategory::Process.to_string(), "process");
    }
}
