//! Stage telemetry hooks.
//!
//! [`StageBus`] turns the steps of one chat exchange into telemetry events on
//! a shared [`TelemetryBus`], all under the `stage` scope.

use serde_json::{Value, json};

use pw_core::telemetry::{TelemetryBus, TelemetryEvent, TokenUsage, kinds};

/// Scope of every event the Stage publishes.
pub const STAGE_SCOPE: &str = "stage";

#[derive(Debug, Clone, Default)]
pub struct StageBus {
    bus: TelemetryBus,
}

impl StageBus {
    pub fn new(bus: TelemetryBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &TelemetryBus {
        &self.bus
    }

    /// `PROMPT_BUILT` with the persona, model parameters and a prompt preview.
    pub fn prompt_built(&self, persona_id: Option<&str>, model: &str, temperature: f64, preview: &str) {
        let event = TelemetryEvent::new(kinds::PROMPT_BUILT, STAGE_SCOPE, "Prompt built").with_data(json!({
            "personaId": persona_id,
            "model": model,
            "temperature": temperature,
            "promptPreview": preview,
        }));
        self.bus.publish(&event);
    }

    pub fn request_sent(&self, model: &str, endpoint: &str) {
        let event = TelemetryEvent::new(kinds::REQUEST_SENT, STAGE_SCOPE, "Request sent")
            .with_data(json!({ "model": model, "endpoint": endpoint }));
        self.bus.publish(&event);
    }

    /// `RESPONSE_RECEIVED`; `usage` is a provider usage object, converted
    /// with [`extract_usage`] for the token counters.
    pub fn response_received(&self, usage: &Value, duration_ms: f64) {
        let event = TelemetryEvent::new(kinds::RESPONSE_RECEIVED, STAGE_SCOPE, "Response received")
            .with_data(json!({ "usage": usage }))
            .with_duration(duration_ms)
            .with_tokens(extract_usage(usage));
        self.bus.publish(&event);
    }

    /// `ERROR` carrying the error text and its cause chain.
    pub fn error(&self, err: &anyhow::Error) {
        let event = TelemetryEvent::new(kinds::ERROR, STAGE_SCOPE, err.to_string())
            .with_data(json!({ "stack": format!("{err:?}") }));
        self.bus.publish(&event);
    }
}

/// Reads token counts from a provider usage object.
///
/// Understands `input_tokens`/`output_tokens`, `prompt_tokens`/
/// `completion_tokens` and a bare `total_tokens` (counted as input). Missing
/// halves count as zero; anything else yields `None`.
pub fn extract_usage(usage: &Value) -> Option<TokenUsage> {
    let obj = usage.as_object()?;
    let count = |key: &str| obj.get(key).map(token_count).unwrap_or(0);

    if obj.contains_key("input_tokens") || obj.contains_key("output_tokens") {
        return Some(TokenUsage {
            input: count("input_tokens"),
            output: count("output_tokens"),
        });
    }
    if obj.contains_key("prompt_tokens") || obj.contains_key("completion_tokens") {
        return Some(TokenUsage {
            input: count("prompt_tokens"),
            output: count("completion_tokens"),
        });
    }
    if obj.contains_key("total_tokens") {
        return Some(TokenUsage {
            input: count("total_tokens"),
            output: 0,
        });
    }
    None
}

fn token_count(value: &Value) -> u64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() && raw > 0.0 { raw.round() as u64 } else { 0 }
}
