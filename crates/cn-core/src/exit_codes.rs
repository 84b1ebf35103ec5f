//! Exit codes for the cert-notify CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: Usage and configuration errors (recoverable by user action)
//! - 20-29: Helper process outcomes
//! - 30-39: Local I/O errors
//! - 40+: Internal errors (bugs, should be reported)

use cn_common::{Error, ErrorCategory};

/// Exit codes for cert-notify operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Notification delivered, or nothing to do.
    Clean = 0,

    /// Invalid arguments
    ArgsError = 10,

    /// No helper executable configured
    NotConfigured = 11,

    /// Config file unreadable, unparsable, or invalid
    ConfigError = 12,

    /// Helper could not be started
    LaunchError = 20,

    /// Helper still running when the wait ended
    TimeoutError = 21,

    /// Helper exited non-zero or its status could not be observed
    ProcessError = 22,

    /// Transient file I/O failed
    IoError = 30,

    /// Internal error (bug - please report)
    InternalError = 40,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::NotConfigured => "ERR_NOT_CONFIGURED",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::LaunchError => "ERR_LAUNCH",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
            ExitCode::ProcessError => "ERR_PROCESS",
            ExitCode::IoError => "ERR_IO",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::ConfigurationMissing => ExitCode::NotConfigured,
            Error::InvalidConfig(_) => ExitCode::ConfigError,
            Error::LaunchFailed(_) | Error::CommandLineTooLong { .. } => ExitCode::LaunchError,
            Error::WaitTimedOut { .. } => ExitCode::TimeoutError,
            Error::PropertyMissing { .. } | Error::PropertyType { .. } => ExitCode::ArgsError,
            _ => match err.category() {
                ErrorCategory::Process => ExitCode::ProcessError,
                ErrorCategory::Io | ErrorCategory::Resource => ExitCode::IoError,
                _ => ExitCode::InternalError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
