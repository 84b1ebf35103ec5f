//! Event-log records and the sinks that receive them.
//!
//! The sink is fire-and-forget from the pipeline's point of view: a record is
//! identified by provider, severity, category and a stable numeric id, and
//! carries its parameters as already-rendered strings.

use chrono::{DateTime, Utc};
use cn_common::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Provider name stamped on every record.
pub const PROVIDER_NAME: &str = "CertNotify";

/// Category for all pipeline records.
pub const CATEGORY_GENERAL: u16 = 1;

/// Tracing target used by [`TracingEventSink`].
pub const EVENT_LOG_TARGET: &str = "cert_notify::event_log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Information,
    Warning,
    Error,
}

/// Stable record identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum EventId {
    ProcessSucceeded = 1000,
    ProcessFailed = 1001,
    ProcessTimedOut = 1002,
    ProcessStartSucceeded = 1003,
    ProcessStartFailed = 1004,
}

impl EventId {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn severity(self) -> EventSeverity {
        match self {
            EventId::ProcessSucceeded | EventId::ProcessStartSucceeded => {
                EventSeverity::Information
            }
            EventId::ProcessTimedOut => EventSeverity::Warning,
            EventId::ProcessFailed | EventId::ProcessStartFailed => EventSeverity::Error,
        }
    }

    /// Number of arguments every record of this kind carries.
    pub fn arity(self) -> usize {
        match self {
            EventId::ProcessSucceeded => 3,
            _ => 4,
        }
    }
}

/// One structured event-log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub provider: String,
    pub severity: EventSeverity,
    pub category: u16,
    pub event: EventId,
    pub event_id: u32,
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl EventRecord {
    pub fn new(event: EventId, arguments: Vec<String>) -> Self {
        EventRecord {
            ts: Utc::now(),
            provider: PROVIDER_NAME.to_string(),
            severity: event.severity(),
            category: CATEGORY_GENERAL,
            event,
            event_id: event.code(),
            arguments,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event_id":{}}}"#,
                self.event_id
            )
        })
    }
}

/// Destination for event-log records.
pub trait EventSink: Send + Sync {
    fn report(&self, record: &EventRecord) -> Result<()>;
}

/// Emits each record as a tracing event on [`EVENT_LOG_TARGET`].
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn report(&self, record: &EventRecord) -> Result<()> {
        let args = record.arguments.join(" | ");
        match record.severity {
            EventSeverity::Information => tracing::info!(
                target: EVENT_LOG_TARGET,
                provider = %record.provider,
                event_id = record.event_id,
                category = record.category,
                args = %args,
                "{:?}",
                record.event
            ),
            EventSeverity::Warning => tracing::warn!(
                target: EVENT_LOG_TARGET,
                provider = %record.provider,
                event_id = record.event_id,
                category = record.category,
                args = %args,
                "{:?}",
                record.event
            ),
            EventSeverity::Error => tracing::error!(
                target: EVENT_LOG_TARGET,
                provider = %record.provider,
                event_id = record.event_id,
                category = record.category,
                args = %args,
                "{:?}",
                record.event
            ),
        }
        Ok(())
    }
}

/// Writes one JSON object per record.
pub struct JsonlEventSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlEventSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> EventSink for JsonlEventSink<W> {
    fn report(&self, record: &EventRecord) -> Result<()> {
        let line = record.to_jsonl();
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("event writer lock poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn event_ids(&self) -> Vec<EventId> {
        self.records().iter().map(|r| r.event).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl EventSink for MemoryEventSink {
    fn report(&self, record: &EventRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| std::io::Error::other("event buffer lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Forwards records to several sinks.
///
/// Every sink is tried; the first failure is returned afterwards.
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutEventSink {
    fn report(&self, record: &EventRecord) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.report(record) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cn_common::Error;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn report(&self, _record: &EventRecord) -> Result<()> {
            Err(Error::Io(std::io::Error::other("sink offline")))
        }
    }

    fn record() -> EventRecord {
        EventRecord::new(
            EventId::ProcessSucceeded,
            vec!["10".into(), "10".into(), "0".into()],
        )
    }

    #[test]
    fn ids_and_severities_are_stable() {
        assert_eq!(EventId::ProcessSucceeded.code(), 1000);
        assert_eq!(EventId::ProcessStartFailed.code(), 1004);
        assert_eq!(EventId::ProcessTimedOut.severity(), EventSeverity::Warning);
        assert_eq!(EventId::ProcessFailed.severity(), EventSeverity::Error);
        assert_eq!(
            EventId::ProcessStartSucceeded.severity(),
            EventSeverity::Information
        );
    }

    #[test]
    fn record_carries_provider_and_category() {
        let r = record();
        assert_eq!(r.provider, PROVIDER_NAME);
        assert_eq!(r.category, CATEGORY_GENERAL);
        assert_eq!(r.event_id, 1000);
        assert_eq!(r.severity, EventSeverity::Information);
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_record() {
        let sink = JsonlEventSink::new(Vec::new());
        sink.report(&record()).unwrap();
        sink.report(&record().with_data(vec![1, 2])).unwrap();

        let bytes = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "process_succeeded");
        assert_eq!(first["event_id"], 1000);
        assert_eq!(first["severity"], "information");
        assert!(first.get("data").is_none());

        let second: EventRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.data, Some(vec![1, 2]));
    }

    #[test]
    fn memory_sink_collects_in_order() {
        let sink = MemoryEventSink::new();
        assert!(sink.is_empty());
        sink.report(&record()).unwrap();
        sink.report(&EventRecord::new(EventId::ProcessFailed, vec![]))
            .unwrap();
        assert_eq!(
            sink.event_ids(),
            vec![EventId::ProcessSucceeded, EventId::ProcessFailed]
        );
    }

    #[test]
    fn fanout_tries_every_sink() {
        let memory = Arc::new(MemoryEventSink::new());
        let fanout = FanoutEventSink::new(vec![
            Arc::new(FailingSink),
            memory.clone(),
            Arc::new(TracingEventSink),
        ]);
        assert!(fanout.report(&record()).is_err());
        assert_eq!(memory.records().len(), 1);
    }
}
