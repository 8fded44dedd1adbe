//! Telemetry: event types, the publish/subscribe bus and the log console.

mod bus;
mod console;
mod event;

pub use bus::{Handler, Subscription, TelemetryBus};
pub use console::{
    DevConsole, DevConsoleConfig, KEY_ENABLED, KEY_LEVEL, KEY_MAX_ENTRIES, KEY_REDACT_FIELDS,
    LogEntry, LogFilter, REDACTION_MASK, SharedConsole, Totals, lock_console, redact,
};
pub use event::{Level, TelemetryEvent, TokenUsage, kinds};
