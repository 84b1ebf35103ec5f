//! Semantic validation of a loaded configuration.

use crate::config::NotificationConfig;
use std::path::Path;

/// Timeouts above this are legal but almost certainly a mistake.
const LONG_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub field: &'static str,
    pub message: String,
}

/// All findings for one config snapshot.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field,
            message: message.into(),
        });
    }

    fn warning(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field,
            message: message.into(),
        });
    }
}

/// Validate a config snapshot.
///
/// Errors describe values the helper can never be launched with; warnings
/// describe values that load but are likely wrong.
pub fn validate(config: &NotificationConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    match &config.executable_path {
        None => report.warning(
            "executable_path",
            "no helper configured; certificate notifications will fail",
        ),
        Some(path) => validate_executable(path, &mut report),
    }

    for (index, arg) in config.arguments.iter().enumerate() {
        if arg.contains('\0') {
            report.error(
                "arguments",
                format!("argument {} contains a NUL character", index),
            );
        }
    }

    if config.process_timeout_ms > LONG_TIMEOUT_MS {
        report.warning(
            "process_timeout_ms",
            format!(
                "{}ms blocks the certificate authority for over 10 minutes per event",
                config.process_timeout_ms
            ),
        );
    }

    if let Some(dir) = &config.temp_dir {
        if !dir.is_dir() {
            report.error(
                "temp_dir",
                format!("{} is not a directory", dir.display()),
            );
        }
    }

    report
}

fn validate_executable(path: &Path, report: &mut ValidationReport) {
    if path.to_string_lossy().contains('\0') {
        report.error("executable_path", "path contains a NUL character");
        return;
    }
    if path.is_relative() {
        report.warning(
            "executable_path",
            format!(
                "{} is relative and will be resolved against the search path",
                path.display()
            ),
        );
    } else if !path.exists() {
        report.warning(
            "executable_path",
            format!("{} does not exist", path.display()),
        );
    }
}
