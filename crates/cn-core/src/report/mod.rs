//! Outcome reporting to the event log.

pub mod event_arg;
pub mod reporter;
pub mod sink;

pub use event_arg::EventArg;
pub use reporter::OutcomeReporter;
pub use sink::{
    EventId, EventRecord, EventSeverity, EventSink, FanoutEventSink, JsonlEventSink,
    MemoryEventSink, TracingEventSink, CATEGORY_GENERAL, EVENT_LOG_TARGET, PROVIDER_NAME,
};
