//! Custom tracing layer for JSONL output.
//!
//! Produces one JSON object per event on stderr while stdout stays reserved
//! for command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields captured from notification spans.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    notification_id: Option<String>,
    stage: Option<String>,
    pid: Option<u32>,
}

struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
    event: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            fields: serde_json::Map::new(),
            message: None,
            event: None,
        }
    }

    fn insert_str(&mut self, name: &str, value: String) {
        match name {
            "message" => self.message = Some(value),
            "event" => self.event = Some(value),
            _ => {
                self.fields
                    .insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.insert_str(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.insert_str(field.name(), format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

struct SpanContextVisitor<'a> {
    context: &'a mut SpanContext,
}

impl tracing::field::Visit for SpanContextVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "notification_id" => self.context.notification_id = Some(value.to_string()),
            "stage" => self.context.stage = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "notification_id" => self.context.notification_id = Some(format!("{:?}", value)),
            "stage" => self.context.stage = Some(format!("{:?}", value)),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "pid" {
            self.context.pid = u32::try_from(value).ok();
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        if field.name() == "pid" {
            self.context.pid = u32::try_from(value).ok();
        }
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut context = SpanContext::default();
        attrs.record(&mut SpanContextVisitor {
            context: &mut context,
        });

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(context);
        }
    }

    // `pid` is usually recorded on the span after the helper starts.
    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            if let Some(context) = extensions.get_mut::<SpanContext>() {
                values.record(&mut SpanContextVisitor { context });
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut notification_id = None;
        let mut stage = None;
        let mut pid = None;

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if notification_id.is_none() {
                        notification_id.clone_from(&span_ctx.notification_id);
                    }
                    if stage.is_none() {
                        stage.clone_from(&span_ctx.stage);
                    }
                    if pid.is_none() {
                        pid = span_ctx.pid;
                    }
                }
            }
        }

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(visitor
                .event
                .as_deref()
                .unwrap_or(event.metadata().target())),
        );

        if let Some(id) = notification_id {
            obj.insert("notification_id".to_string(), serde_json::json!(id));
        }
        if let Some(s) = stage {
            obj.insert("stage".to_string(), serde_json::json!(s));
        }
        if let Some(p) = pid {
            obj.insert("pid".to_string(), serde_json::json!(p));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
pub(crate) mod capture {
    use super::JsonlLayer;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a JSONL subscriber and return the parsed lines.
    pub(crate) fn capture<F: FnOnce()>(f: F) -> Vec<serde_json::Value> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}
