//! Certificate authority exit-event notification pipeline.
//!
//! When the certificate authority issues a certificate, the pipeline stages
//! the raw certificate in a transient file, launches a configured helper
//! process with the event data on its command line, waits a bounded time, and
//! records the outcome in the event log. Failures are returned as errors and
//! never escape as panics.

pub mod command_line;
pub mod exit_codes;
pub mod host;
pub mod logging;
pub mod process;
pub mod processor;
pub mod report;
pub mod temp_file;

pub use host::{ExitEvent, ExitModule, MapPropertySource, PropertySource};
pub use processor::{EventProcessor, NotifyOutcome};
pub use report::{EventSink, OutcomeReporter};
