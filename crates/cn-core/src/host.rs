//! Certificate authority exit-module surface.
//!
//! The host registers for a mask of [`ExitEvent`]s and calls
//! [`ExitModule::notify`] with the raw event code and a property source
//! scoped to the certificate the event concerns.

use chrono::{DateTime, Utc};
use cn_common::{Buffer, Error, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, info_span};

use crate::logging::{event_names, Stage};
use crate::processor::EventProcessor;

/// Property names read for a certificate-issued event.
pub mod property_names {
    pub const SUBJECT_KEY_IDENTIFIER: &str = "SubjectKeyIdentifier";
    pub const SERIAL_NUMBER: &str = "SerialNumber";
    pub const RAW_CERTIFICATE: &str = "RawCertificate";
}

/// Lifecycle events raised by the certificate authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ExitEvent {
    CertIssued = 0x1,
    CertPending = 0x2,
    CertDenied = 0x4,
    CertRevoked = 0x8,
    CertRetrievePending = 0x10,
    CrlIssued = 0x20,
    Shutdown = 0x40,
    CertImported = 0x200,
}

impl ExitEvent {
    pub const ALL: [ExitEvent; 8] = [
        ExitEvent::CertIssued,
        ExitEvent::CertPending,
        ExitEvent::CertDenied,
        ExitEvent::CertRevoked,
        ExitEvent::CertRetrievePending,
        ExitEvent::CrlIssued,
        ExitEvent::Shutdown,
        ExitEvent::CertImported,
    ];

    /// Registration mask covering every event.
    pub const ALL_MASK: u32 = 0x27f;

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ExitEvent::CertIssued => "cert-issued",
            ExitEvent::CertPending => "cert-pending",
            ExitEvent::CertDenied => "cert-denied",
            ExitEvent::CertRevoked => "cert-revoked",
            ExitEvent::CertRetrievePending => "cert-retrieve-pending",
            ExitEvent::CrlIssued => "crl-issued",
            ExitEvent::Shutdown => "shutdown",
            ExitEvent::CertImported => "cert-imported",
        }
    }

    /// Look up an event by name, with or without the `cert-` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|event| {
            let full = event.name();
            full == name || full.strip_prefix("cert-") == Some(name.as_str())
        })
    }
}

impl fmt::Display for ExitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse an event given by name, decimal code, or `0x` hex code.
pub fn parse_event_code(input: &str) -> Option<u32> {
    if let Some(event) = ExitEvent::from_name(input) {
        return Some(event.code());
    }
    match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => input.parse().ok(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Long,
    Date,
    Binary,
    String,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyKind::Long => "long",
            PropertyKind::Date => "date",
            PropertyKind::Binary => "binary",
            PropertyKind::String => "string",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Long(i64),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    String(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Long(_) => PropertyKind::Long,
            PropertyValue::Date(_) => PropertyKind::Date,
            PropertyValue::Binary(_) => PropertyKind::Binary,
            PropertyValue::String(_) => PropertyKind::String,
        }
    }
}

fn type_error(name: &str, expected: PropertyKind) -> Error {
    Error::PropertyType {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

/// Read-only access to the properties of one certificate or request.
pub trait PropertySource {
    fn get_property(&self, name: &str, kind: PropertyKind) -> Result<PropertyValue>;

    fn get_string_property(&self, name: &str) -> Result<String> {
        match self.get_property(name, PropertyKind::String)? {
            PropertyValue::String(s) => Ok(s),
            _ => Err(type_error(name, PropertyKind::String)),
        }
    }

    fn get_long_property(&self, name: &str) -> Result<i64> {
        match self.get_property(name, PropertyKind::Long)? {
            PropertyValue::Long(n) => Ok(n),
            _ => Err(type_error(name, PropertyKind::Long)),
        }
    }

    fn get_date_property(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.get_property(name, PropertyKind::Date)? {
            PropertyValue::Date(d) => Ok(d),
            _ => Err(type_error(name, PropertyKind::Date)),
        }
    }

    fn get_binary_property(&self, name: &str) -> Result<Buffer<u8>> {
        match self.get_property(name, PropertyKind::Binary)? {
            PropertyValue::Binary(bytes) => Ok(Buffer::from_vec(bytes)),
            _ => Err(type_error(name, PropertyKind::Binary)),
        }
    }
}

/// In-memory property source.
#[derive(Debug, Clone, Default)]
pub struct MapPropertySource {
    properties: HashMap<String, PropertyValue>,
}

impl MapPropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, PropertyValue::String(value.into()));
        self
    }

    pub fn with_long(mut self, name: impl Into<String>, value: i64) -> Self {
        self.insert(name, PropertyValue::Long(value));
        self
    }

    pub fn with_date(mut self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.insert(name, PropertyValue::Date(value));
        self
    }

    pub fn with_binary(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(name, PropertyValue::Binary(value.into()));
        self
    }
}

impl PropertySource for MapPropertySource {
    fn get_property(&self, name: &str, kind: PropertyKind) -> Result<PropertyValue> {
        let value = self
            .properties
            .get(name)
            .ok_or_else(|| Error::PropertyMissing {
                name: name.to_string(),
            })?;
        if value.kind() != kind {
            return Err(type_error(name, kind));
        }
        Ok(value.clone())
    }
}

/// Exit-module glue between the host and the event processor.
pub struct ExitModule {
    processor: EventProcessor,
}

impl ExitModule {
    pub fn new(processor: EventProcessor) -> Self {
        ExitModule { processor }
    }

    /// Returns the mask of events to subscribe to.
    pub fn initialize(&self) -> u32 {
        let _span = info_span!("exit_module", stage = %Stage::Init).entered();
        info!(
            configured = self.processor.config().is_configured(),
            mask = ExitEvent::ALL_MASK,
            "exit module initialized"
        );
        ExitEvent::ALL_MASK
    }

    pub fn description(&self) -> &'static str {
        "Runs a configured helper process when certificates are issued"
    }

    /// Handle one raw event code.
    ///
    /// Certificate-issued and CRL-issued run the notification pipeline; every
    /// other code, known or not, is a successful no-op.
    pub fn notify(&self, code: u32, properties: &dyn PropertySource) -> Result<()> {
        let _span = info_span!("exit_event", stage = %Stage::Dispatch).entered();
        let Some(event) = ExitEvent::from_code(code) else {
            debug!(
                event = event_names::EVENT_IGNORED,
                code,
                "unknown exit event {:#x}",
                code
            );
            return Ok(());
        };
        debug!(event = event_names::EVENT_RECEIVED, exit_event = %event, "exit event");

        match event {
            ExitEvent::CertIssued | ExitEvent::CrlIssued => {
                self.notify_cert_issued(properties)
            }
            _ => {
                debug!(
                    event = event_names::EVENT_IGNORED,
                    exit_event = %event,
                    "no action for event"
                );
                Ok(())
            }
        }
    }

    fn notify_cert_issued(&self, properties: &dyn PropertySource) -> Result<()> {
        let subject_key_id =
            properties.get_string_property(property_names::SUBJECT_KEY_IDENTIFIER)?;
        let serial_number = properties.get_string_property(property_names::SERIAL_NUMBER)?;
        let raw_cert = properties.get_binary_property(property_names::RAW_CERTIFICATE)?;

        self.processor
            .notify_cert_issued(&subject_key_id, &serial_number, &raw_cert)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::layer::capture::capture;
    use crate::report::{MemoryEventSink, OutcomeReporter};
    use cn_config::NotificationConfig;
    use std::sync::Arc;

    fn module(config: NotificationConfig) -> (Arc<MemoryEventSink>, ExitModule) {
        let sink = Arc::new(MemoryEventSink::new());
        let processor = EventProcessor::new(config, OutcomeReporter::new(sink.clone()));
        (sink, ExitModule::new(processor))
    }

    fn cert_properties() -> MapPropertySource {
        MapPropertySource::new()
            .with_string(property_names::SUBJECT_KEY_IDENTIFIER, "ABCD1234")
            .with_string(property_names::SERIAL_NUMBER, "01")
            .with_binary(property_names::RAW_CERTIFICATE, vec![0x30, 0x82])
    }

    #[test]
    fn mask_covers_all_events() {
        let mask = ExitEvent::ALL.iter().fold(0, |acc, e| acc | e.code());
        assert_eq!(mask, ExitEvent::ALL_MASK);
    }

    #[test]
    fn codes_round_trip() {
        assert_eq!(ExitEvent::from_code(0x200), Some(ExitEvent::CertImported));
        assert_eq!(ExitEvent::from_code(0x100), None);
    }

    #[test]
    fn names_accept_short_forms() {
        assert_eq!(ExitEvent::from_name("issued"), Some(ExitEvent::CertIssued));
        assert_eq!(ExitEvent::from_name("CRL_ISSUED"), Some(ExitEvent::CrlIssued));
        assert_eq!(parse_event_code("revoked"), Some(0x8));
        assert_eq!(parse_event_code("0x40"), Some(0x40));
        assert_eq!(parse_event_code("512"), Some(0x200));
        assert_eq!(parse_event_code("bogus"), None);
    }

    #[test]
    fn map_source_checks_kind() {
        let source = cert_properties().with_long("RequestId", 7);
        assert_eq!(source.get_long_property("RequestId").unwrap(), 7);
        assert!(matches!(
            source.get_long_property(property_names::SERIAL_NUMBER),
            Err(Error::PropertyType { .. })
        ));
        assert!(matches!(
            source.get_string_property("Missing"),
            Err(Error::PropertyMissing { .. })
        ));
        let raw = source
            .get_binary_property(property_names::RAW_CERTIFICATE)
            .unwrap();
        assert_eq!(raw.as_slice(), &[0x30, 0x82]);
    }

    #[test]
    fn date_properties_are_typed() {
        let when = Utc::now();
        let source = MapPropertySource::new().with_date("NotBefore", when);
        assert_eq!(source.get_date_property("NotBefore").unwrap(), when);
    }

    #[test]
    fn other_events_are_no_ops() {
        let (sink, module) = module(NotificationConfig::default());
        let empty = MapPropertySource::new();
        for event in [
            ExitEvent::CertPending,
            ExitEvent::CertDenied,
            ExitEvent::CertRevoked,
            ExitEvent::CertRetrievePending,
            ExitEvent::Shutdown,
            ExitEvent::CertImported,
        ] {
            module.notify(event.code(), &empty).unwrap();
        }
        module.notify(0x1000, &empty).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn issued_requires_properties() {
        let (_, module) = module(NotificationConfig::default());
        let err = module
            .notify(ExitEvent::CertIssued.code(), &MapPropertySource::new())
            .unwrap_err();
        assert!(matches!(err, Error::PropertyMissing { .. }));
    }

    #[test]
    fn crl_issued_takes_the_issued_path() {
        let dir = tempfile::tempdir().unwrap();
        let (_, module) = module(NotificationConfig::default().with_temp_dir(dir.path()));
        let err = module
            .notify(ExitEvent::CrlIssued.code(), &cert_properties())
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing));
    }

    #[test]
    fn dispatch_logs_carry_stage() {
        let (_, module) = module(NotificationConfig::default());
        let lines = capture(|| {
            module.initialize();
            module.notify(0x1000, &MapPropertySource::new()).unwrap();
        });
        assert_eq!(lines[0]["stage"], "init");
        let ignored = lines
            .iter()
            .find(|line| line["event"] == event_names::EVENT_IGNORED)
            .unwrap();
        assert_eq!(ignored["stage"], "dispatch");
    }

    #[test]
    fn issued_dispatch_stage_yields_to_pipeline_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (_, module) = module(NotificationConfig::default().with_temp_dir(dir.path()));
        let lines = capture(|| {
            let _ = module.notify(ExitEvent::CertIssued.code(), &cert_properties());
        });
        let received = lines
            .iter()
            .find(|line| line["event"] == event_names::EVENT_RECEIVED)
            .unwrap();
        assert_eq!(received["stage"], "dispatch");
        let not_configured = lines
            .iter()
            .find(|line| line["event"] == event_names::NOTIFY_NOT_CONFIGURED)
            .unwrap();
        assert_eq!(not_configured["stage"], "stage");
        assert!(not_configured["notification_id"].is_string());
    }

    #[test]
    fn initialize_returns_full_mask() {
        let (_, module) = module(NotificationConfig::default());
        assert_eq!(module.initialize(), 0x27f);
        assert!(!module.description().is_empty());
    }
}
