//! Certificate-issued notification orchestration.
//!
//! One call stages the raw certificate in a transient file, launches the
//! configured helper with the event data on its command line, waits a bounded
//! time, and reports the outcome. Every call owns its own file and process;
//! the configuration snapshot is the only shared state and is never mutated.

use cn_common::{Error, ProcessIds, Result};
use cn_config::NotificationConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, field, info, info_span, warn, Span};

use crate::command_line::quote_for_shell;
use crate::logging::{event_names, generate_notification_id, Stage};
use crate::process::{ChildProcess, CreationFlags};
use crate::report::OutcomeReporter;
use crate::temp_file::TransientFile;

/// Literal tokens of the helper's command line.
pub mod tokens {
    pub const CERT_ISSUED: &str = "certissued";
    pub const SUBJECT_KEY_IDENTIFIER: &str = "-subjectkeyidentifier";
    pub const SERIAL_NUMBER: &str = "-serialnumber";
    pub const RAW_CERT_PATH: &str = "-rawcertpath";
}

/// What the helper did, for calls that return successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// Helper exited with code zero; the transient file was deleted.
    Succeeded { ids: ProcessIds },
    /// Helper exited non-zero; the transient file was kept.
    HelperFailed {
        ids: ProcessIds,
        exit_code: u32,
        preserved: PathBuf,
    },
}

impl NotifyOutcome {
    pub fn ids(&self) -> ProcessIds {
        match self {
            NotifyOutcome::Succeeded { ids } | NotifyOutcome::HelperFailed { ids, .. } => *ids,
        }
    }
}

/// Runs the notification pipeline for one configuration snapshot.
pub struct EventProcessor {
    config: NotificationConfig,
    reporter: OutcomeReporter,
    flags: CreationFlags,
}

impl EventProcessor {
    pub fn new(config: NotificationConfig, reporter: OutcomeReporter) -> Self {
        EventProcessor {
            config,
            reporter,
            flags: CreationFlags::detached(),
        }
    }

    pub fn with_creation_flags(mut self, flags: CreationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Argument list for one certificate: fixed arguments, then event data.
    ///
    /// With `escape_for_shell`, the subject key identifier and the temp path
    /// are single-quoted; the serial number never is.
    pub fn build_arguments(
        &self,
        subject_key_id: &str,
        serial_number: &str,
        temp_path: &Path,
    ) -> Vec<String> {
        let temp_path = temp_path.display().to_string();
        let (subject_key_id, temp_path) = if self.config.escape_for_shell {
            (quote_for_shell(subject_key_id), quote_for_shell(&temp_path))
        } else {
            (subject_key_id.to_string(), temp_path)
        };

        let mut args = self.config.arguments.clone();
        args.extend([
            tokens::CERT_ISSUED.to_string(),
            tokens::SUBJECT_KEY_IDENTIFIER.to_string(),
            subject_key_id,
            tokens::SERIAL_NUMBER.to_string(),
            serial_number.to_string(),
            tokens::RAW_CERT_PATH.to_string(),
            temp_path,
        ]);
        args
    }

    /// Notify the helper that a certificate was issued.
    ///
    /// A non-zero helper exit is reported and its transient file preserved,
    /// but the call still succeeds so the host treats the event as handled.
    /// A timeout, a failed wait, or an unreadable exit status preserves the
    /// file and returns the error. A missing helper configuration fails with
    /// [`Error::ConfigurationMissing`] without reporting anything.
    pub fn notify_cert_issued(
        &self,
        subject_key_id: &str,
        serial_number: &str,
        raw_cert: &[u8],
    ) -> Result<NotifyOutcome> {
        let span = info_span!(
            "notify_cert_issued",
            notification_id = %generate_notification_id(),
            stage = field::Empty,
            pid = field::Empty,
        );
        let _guard = span.enter();

        info!(
            event = event_names::NOTIFY_STARTED,
            serial_number,
            cert_len = raw_cert.len(),
            "certificate issued"
        );
        let result = self.run(&span, subject_key_id, serial_number, raw_cert);
        match &result {
            Ok(outcome) => info!(
                event = event_names::NOTIFY_FINISHED,
                outcome = ?outcome,
                "notification finished"
            ),
            Err(e) => warn!(
                event = event_names::NOTIFY_FINISHED,
                code = e.code(),
                error = %e,
                "notification failed"
            ),
        }
        result
    }

    fn run(
        &self,
        span: &Span,
        subject_key_id: &str,
        serial_number: &str,
        raw_cert: &[u8],
    ) -> Result<NotifyOutcome> {
        enter_stage(span, Stage::Stage);
        let mut temp = self.stage_certificate(raw_cert)?;
        let temp_path = temp
            .path()
            .map(Path::to_path_buf)
            .ok_or(Error::NotOpen)?;

        let args = self.build_arguments(subject_key_id, serial_number, &temp_path);

        let Some(exe) = self.config.executable_path.as_deref() else {
            info!(
                event = event_names::NOTIFY_NOT_CONFIGURED,
                "no helper configured"
            );
            return Err(Error::ConfigurationMissing);
        };

        enter_stage(span, Stage::Launch);
        let mut process = ChildProcess::new();
        let ids = match process.create(exe, &args, self.flags) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    event = event_names::PROCESS_START_FAILED,
                    exe = %exe.display(),
                    error = %e,
                    "helper failed to start"
                );
                enter_stage(span, Stage::Report);
                self.reporter
                    .process_start_failed(exe, process.command_line().unwrap_or_default(), &e);
                return Err(e);
            }
        };
        span.record("pid", ids.pid);
        let command_line = process.command_line().unwrap_or_default();
        info!(
            event = event_names::PROCESS_STARTED,
            tid = ids.tid,
            command_line,
            "helper started"
        );
        self.reporter.process_start_succeeded(exe, command_line, ids);

        enter_stage(span, Stage::Wait);
        let timeout = self.config.process_timeout();
        if let Err(e) = process.wait(timeout) {
            enter_stage(span, Stage::Report);
            if e.is_timeout() {
                warn!(
                    event = event_names::PROCESS_TIMED_OUT,
                    timeout_ms = timeout.as_millis() as u64,
                    "helper still running; leaving it alone"
                );
                self.reporter.process_timed_out(timeout, ids, &temp_path);
            } else {
                warn!(
                    event = event_names::PROCESS_WAIT_FAILED,
                    error = %e,
                    "could not observe helper"
                );
            }
            keep(&mut temp, &temp_path);
            return Err(e);
        }

        enter_stage(span, Stage::Report);
        let exit_code = match process.exit_code() {
            Ok(code) => code,
            Err(e) => {
                warn!(
                    event = event_names::PROCESS_WAIT_FAILED,
                    error = %e,
                    "helper exit status unavailable"
                );
                keep(&mut temp, &temp_path);
                return Err(e);
            }
        };
        info!(event = event_names::PROCESS_EXITED, exit_code, "helper exited");

        if exit_code != 0 {
            self.reporter
                .process_failed(ids, exit_code, &temp_path);
            keep(&mut temp, &temp_path);
            return Ok(NotifyOutcome::HelperFailed {
                ids,
                exit_code,
                preserved: temp_path,
            });
        }

        self.reporter.process_succeeded(ids, exit_code);
        Ok(NotifyOutcome::Succeeded { ids })
    }

    /// Write the certificate to a fresh, closed transient file.
    fn stage_certificate(&self, raw_cert: &[u8]) -> Result<TransientFile> {
        let path = TransientFile::unique_path(&self.config.effective_temp_dir())?;
        let mut temp = TransientFile::new();
        if let Err(e) = temp.create(&path) {
            discard_reserved(&path);
            return Err(e);
        }
        temp.write_all(raw_cert)?;
        temp.close();
        debug!(
            event = event_names::TEMP_FILE_WRITTEN,
            path = %path.display(),
            bytes = raw_cert.len(),
            "certificate staged"
        );
        Ok(temp)
    }
}

/// Remove a reserved path whose file could not be opened.
fn discard_reserved(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            event = event_names::TEMP_FILE_DELETE_FAILED,
            path = %path.display(),
            error = %e,
            "failed to remove reserved transient path"
        ),
    }
}

fn enter_stage(span: &Span, stage: Stage) {
    span.record("stage", field::display(stage));
}

fn keep(temp: &mut TransientFile, path: &Path) {
    temp.preserve();
    info!(
        event = event_names::TEMP_FILE_PRESERVED,
        path = %path.display(),
        "preserving transient file for debugging"
    );
}
