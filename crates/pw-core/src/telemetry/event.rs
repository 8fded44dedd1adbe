//! Telemetry events and log levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PwError;

/// Event kinds published by the Stage chat flow.
pub mod kinds {
    pub const PROMPT_BUILT: &str = "PROMPT_BUILT";
    pub const REQUEST_SENT: &str = "REQUEST_SENT";
    pub const RESPONSE_RECEIVED: &str = "RESPONSE_RECEIVED";
    pub const ERROR: &str = "ERROR";
}

/// Log severity, ordered `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = PwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(PwError::config(format!("Unknown log level: {other}"))),
        }
    }
}

/// Token counts attached to a completed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// A single telemetry event as published on the bus.
///
/// `kind` is passed through untouched; the console derives a level from it
/// unless `level` is set explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

impl TelemetryEvent {
    pub fn new(kind: impl Into<String>, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            level: None,
            scope: scope.into(),
            message: message.into(),
            data: Value::Null,
            duration_ms: None,
            tokens: None,
        }
    }

    /// A plain log line (`kind` is the level name).
    pub fn log(level: Level, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(level.as_str(), scope, message).with_level(level)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_tokens(mut self, tokens: Option<TokenUsage>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Effective severity: explicit level, else `ERROR` maps to error, a bare
    /// level name maps to itself, and everything else is info.
    pub fn effective_level(&self) -> Level {
        if let Some(level) = self.level {
            return level;
        }
        if self.kind.eq_ignore_ascii_case(kinds::ERROR) {
            return Level::Error;
        }
        self.kind.parse().unwrap_or(Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_kinds_map_to_levels() {
        assert_eq!(TelemetryEvent::new(kinds::PROMPT_BUILT, "stage", "").effective_level(), Level::Info);
        assert_eq!(TelemetryEvent::new(kinds::ERROR, "stage", "").effective_level(), Level::Error);
        assert_eq!(TelemetryEvent::new("warn", "system", "").effective_level(), Level::Warn);
        assert_eq!(
            TelemetryEvent::new(kinds::REQUEST_SENT, "stage", "")
                .with_level(Level::Debug)
                .effective_level(),
            Level::Debug
        );
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn event_serializes_type_key() {
        let evt = TelemetryEvent::new(kinds::REQUEST_SENT, "stage", "Request sent");
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["type"], "REQUEST_SENT");
        assert!(json.get("level").is_none());
    }
}
