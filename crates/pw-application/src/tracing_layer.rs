//! Tracing layer that forwards log events to the telemetry bus.
//!
//! Lets the log console show library logs next to Stage events: every
//! `tracing` event becomes a [`TelemetryEvent`] whose scope is the event
//! target and whose data holds the structured fields.

use serde_json::{Map, Value};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use pw_core::telemetry::{Level, TelemetryBus, TelemetryEvent};

/// Targets never forwarded. The bus reports its own subscriber failures
/// through `tracing`, which would otherwise loop back into the bus.
const SILENCED_TARGETS: &[&str] = &["pw_core::telemetry"];

pub struct TelemetryLayer {
    bus: TelemetryBus,
}

impl TelemetryLayer {
    pub fn new(bus: TelemetryBus) -> Self {
        Self { bus }
    }
}

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if SILENCED_TARGETS.iter().any(|t| target.starts_with(t)) {
            return;
        }

        let mut fields = Map::new();
        event.record(&mut FieldVisitor(&mut fields));
        let message = match fields.remove("message") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let mut telemetry = TelemetryEvent::log(level_of(event.metadata().level()), target, message);
        if !fields.is_empty() {
            telemetry = telemetry.with_data(Value::Object(fields));
        }
        self.bus.publish(&telemetry);
    }
}

fn level_of(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

/// Collects event fields into a JSON map.
struct FieldVisitor<'a>(&'a mut Map<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(format!("{:?}", value)));
    }
}
