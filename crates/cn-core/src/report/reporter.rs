//! Translates helper outcomes into event-log records.

use cn_common::{Error, ProcessIds};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::event_arg::{render_all, EventArg};
use super::sink::{EventId, EventRecord, EventSink};
use crate::logging::event_names;

/// Emits one record per helper outcome.
///
/// Sink failures are logged and swallowed: reporting never changes the
/// result of a notification.
#[derive(Clone)]
pub struct OutcomeReporter {
    sink: Arc<dyn EventSink>,
}

impl OutcomeReporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        OutcomeReporter { sink }
    }

    /// Helper exited with code zero.
    pub fn process_succeeded(&self, ids: ProcessIds, exit_code: u32) {
        self.emit(
            EventId::ProcessSucceeded,
            vec![ids.pid.into(), ids.tid.into(), exit_code.into()],
        );
    }

    /// Helper exited with a non-zero code.
    pub fn process_failed(&self, ids: ProcessIds, exit_code: u32, temp_path: &Path) {
        self.emit(
            EventId::ProcessFailed,
            vec![
                ids.pid.into(),
                ids.tid.into(),
                exit_code.into(),
                path_arg(temp_path),
            ],
        );
    }

    /// Helper was still running when the wait gave up.
    pub fn process_timed_out(&self, timeout: Duration, ids: ProcessIds, temp_path: &Path) {
        self.emit(
            EventId::ProcessTimedOut,
            vec![
                timeout.as_secs().into(),
                ids.pid.into(),
                ids.tid.into(),
                path_arg(temp_path),
            ],
        );
    }

    pub fn process_start_succeeded(&self, exe: &Path, command_line: &str, ids: ProcessIds) {
        self.emit(
            EventId::ProcessStartSucceeded,
            vec![
                path_arg(exe),
                command_line.into(),
                ids.pid.into(),
                ids.tid.into(),
            ],
        );
    }

    /// Helper could not be started.
    ///
    /// OS failures carry the OS error number and its message; anything else
    /// carries the stable error code and the error's text.
    pub fn process_start_failed(&self, exe: &Path, command_line: &str, error: &Error) {
        let (code, message) = match error.os_error() {
            Some(os) => (EventArg::ErrorCode(os), EventArg::SystemErrorMessage(os)),
            None => (
                EventArg::ErrorCode(error.code() as i32),
                EventArg::Text(error.to_string()),
            ),
        };
        self.emit(
            EventId::ProcessStartFailed,
            vec![path_arg(exe), command_line.into(), code, message],
        );
    }

    fn emit(&self, event: EventId, args: Vec<EventArg>) {
        debug_assert_eq!(args.len(), event.arity());
        let record = EventRecord::new(event, render_all(&args));
        if let Err(e) = self.sink.report(&record) {
            warn!(
                event = event_names::SINK_FAILED,
                event_id = event.code(),
                error = %e,
                "failed to write event record"
            );
        }
    }
}

fn path_arg(path: &Path) -> EventArg {
    EventArg::Text(path.display().to_string())
}
