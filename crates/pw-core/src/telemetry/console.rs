//! Headless log console fed by the telemetry bus.
//!
//! Keeps a capped ring of redacted entries, running token totals, and the
//! view state (pause, filters, selection). Rendering is up to the caller.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::bus::{Subscription, TelemetryBus};
use super::event::{Level, TelemetryEvent, TokenUsage};
use crate::config::SettingsStore;
use crate::error::Result;

pub const KEY_ENABLED: &str = "devConsole.enabled";
pub const KEY_LEVEL: &str = "devConsole.level";
pub const KEY_MAX_ENTRIES: &str = "devConsole.maxEntries";
pub const KEY_REDACT_FIELDS: &str = "devConsole.redactFields";

/// Replacement written over redacted values.
pub const REDACTION_MASK: &str = "***";

const EXPORT_APP: &str = "PersonaWorks Stage";
const EXPORT_VERSION: &str = "1.0.0";

/// Persisted console settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevConsoleConfig {
    pub enabled: bool,
    pub level: Level,
    pub max_entries: usize,
    pub redact_fields: Vec<String>,
}

impl Default for DevConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: Level::Info,
            max_entries: 200,
            redact_fields: vec!["apiKey".into(), "nsfw".into(), "notes".into()],
        }
    }
}

impl DevConsoleConfig {
    /// Reads each `devConsole.*` key, falling back to `self` for missing or
    /// malformed values, then writes the effective values back.
    pub async fn load(store: &dyn SettingsStore, fallback: DevConsoleConfig) -> Result<Self> {
        let mut cfg = fallback;
        if let Some(v) = store.get(KEY_ENABLED).await?.and_then(|v| v.as_bool()) {
            cfg.enabled = v;
        }
        if let Some(level) = store
            .get(KEY_LEVEL)
            .await?
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
        {
            cfg.level = level;
        }
        if let Some(n) = store.get(KEY_MAX_ENTRIES).await?.and_then(|v| v.as_u64()) {
            cfg.max_entries = n as usize;
        }
        if let Some(fields) = store
            .get(KEY_REDACT_FIELDS)
            .await?
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
        {
            cfg.redact_fields = fields;
        }
        cfg.save(store).await?;
        Ok(cfg)
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        store.set(KEY_ENABLED, json!(self.enabled)).await?;
        store.set(KEY_LEVEL, json!(self.level.as_str())).await?;
        store.set(KEY_MAX_ENTRIES, json!(self.max_entries)).await?;
        store.set(KEY_REDACT_FIELDS, json!(self.redact_fields)).await?;
        Ok(())
    }

    fn cap(&self) -> usize {
        if self.max_entries == 0 {
            DevConsoleConfig::default().max_entries
        } else {
            self.max_entries
        }
    }
}

/// One retained console line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Event kind, lower-cased.
    #[serde(rename = "type")]
    pub kind: String,
    pub level: Level,
    /// Epoch milliseconds.
    pub ts: i64,
    /// Local wall-clock time, `HH:MM:SS.mmm`.
    pub time: String,
    pub scope: String,
    pub message: String,
    pub data: Value,
    pub duration_ms: Option<i64>,
    pub tokens: Option<TokenUsage>,
}

impl LogEntry {
    /// `[level] message • 12ms`
    pub fn summary(&self) -> String {
        match self.duration_ms {
            Some(ms) if ms > 0 => format!("[{}] {} • {}ms", self.kind, self.message, ms),
            _ => format!("[{}] {}", self.kind, self.message),
        }
    }
}

/// View filter over retained entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub levels: BTreeSet<Level>,
    /// Exact scope to show; empty shows all scopes.
    pub scope: String,
    /// Lower-cased substring matched against message and JSON data.
    pub search: String,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            levels: Level::ALL.into_iter().collect(),
            scope: String::new(),
            search: String::new(),
        }
    }
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.levels.contains(&entry.level) {
            return false;
        }
        if !self.scope.is_empty() && self.scope != entry.scope {
            return false;
        }
        if !self.search.is_empty() {
            let data = if entry.data.is_null() {
                "{}".to_string()
            } else {
                entry.data.to_string()
            };
            let haystack = format!("{} {}", entry.message, data).to_lowercase();
            if !haystack.contains(&self.search) {
                return false;
            }
        }
        true
    }
}

/// Running totals over entries that carried token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub requests: u64,
    pub latency_sum_ms: i64,
}

impl Totals {
    /// Rounded mean latency, 0 before the first request.
    pub fn average_latency_ms(&self) -> i64 {
        if self.requests == 0 {
            0
        } else {
            (self.latency_sum_ms as f64 / self.requests as f64).round() as i64
        }
    }
}

/// Console shared between the bus subscriber and its owner.
pub type SharedConsole = Arc<Mutex<DevConsole>>;

#[derive(Debug, Clone, Default)]
pub struct DevConsole {
    config: DevConsoleConfig,
    entries: VecDeque<LogEntry>,
    filter: LogFilter,
    paused: bool,
    totals: Totals,
    selected: Option<LogEntry>,
    visible: bool,
}

impl DevConsole {
    pub fn new(config: DevConsoleConfig) -> Self {
        Self {
            visible: config.enabled,
            config,
            ..Default::default()
        }
    }

    /// Builds a console from persisted settings.
    pub async fn from_settings(store: &dyn SettingsStore, fallback: DevConsoleConfig) -> Result<Self> {
        let config = DevConsoleConfig::load(store, fallback).await?;
        Ok(Self::new(config))
    }

    /// Wraps the console for sharing and subscribes it to `bus`.
    pub fn attach(self, bus: &TelemetryBus) -> (SharedConsole, Subscription) {
        let shared: SharedConsole = Arc::new(Mutex::new(self));
        let sink = shared.clone();
        let subscription = bus.subscribe(move |event| {
            lock_console(&sink).log(event);
            Ok(())
        });
        (shared, subscription)
    }

    pub fn config(&self) -> &DevConsoleConfig {
        &self.config
    }

    /// Records an event. Returns `false` when paused or below the level.
    pub fn log(&mut self, event: &TelemetryEvent) -> bool {
        if self.paused {
            return false;
        }
        let level = event.effective_level();
        if level < self.config.level {
            return false;
        }

        let now = chrono::Local::now();
        let entry = LogEntry {
            kind: event.kind.to_lowercase(),
            level,
            ts: now.timestamp_millis(),
            time: now.format("%H:%M:%S%.3f").to_string(),
            scope: event.scope.clone(),
            message: event.message.clone(),
            data: redact(&event.data, &self.config.redact_fields),
            duration_ms: event.duration_ms.map(|ms| ms.round() as i64),
            tokens: event.tokens,
        };

        if let Some(tokens) = entry.tokens {
            self.totals.input_tokens += tokens.input;
            self.totals.output_tokens += tokens.output;
            self.totals.requests += 1;
            self.totals.latency_sum_ms += entry.duration_ms.unwrap_or(0);
        }

        self.entries.push_back(entry);
        let cap = self.config.cap();
        while self.entries.len() > cap {
            self.entries.pop_front();
        }
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Flips pause and returns the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Drops entries, selection and totals.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
        self.totals = Totals::default();
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries passing the current view filter, oldest first.
    pub fn filtered(&self) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| self.filter.matches(e)).collect()
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn show_level(&mut self, level: Level, on: bool) {
        if on {
            self.filter.levels.insert(level);
        } else {
            self.filter.levels.remove(&level);
        }
    }

    pub fn set_scope_filter(&mut self, scope: impl Into<String>) {
        self.filter.scope = scope.into();
    }

    pub fn set_search(&mut self, search: &str) {
        self.filter.search = search.to_lowercase();
    }

    /// Selects the `index`-th filtered entry for the payload view.
    pub fn select(&mut self, index: usize) -> Option<&LogEntry> {
        let picked = self.filtered().get(index).map(|e| (*e).clone());
        self.selected = picked;
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&LogEntry> {
        self.selected.as_ref()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Shows, hides (`Some`) or flips (`None`) the console and persists the
    /// result as `devConsole.enabled`.
    pub async fn toggle(&mut self, force: Option<bool>, store: Option<&dyn SettingsStore>) -> Result<bool> {
        self.visible = force.unwrap_or(!self.visible);
        self.config.enabled = self.visible;
        if let Some(store) = store {
            store.set(KEY_ENABLED, json!(self.visible)).await?;
        }
        Ok(self.visible)
    }

    /// Export document with metadata, settings and every retained entry.
    pub fn export(&self) -> Value {
        json!({
            "meta": {
                "app": EXPORT_APP,
                "version": EXPORT_VERSION,
                "ts": chrono::Utc::now().timestamp_millis(),
            },
            "settings": {
                "level": self.config.level,
                "maxEntries": self.config.max_entries,
            },
            "logs": self.entries,
        })
    }

    /// Suggested file name for [`export`](Self::export).
    pub fn export_filename() -> String {
        format!("devconsole_export_{}.json", chrono::Utc::now().timestamp_millis())
    }
}

/// Locks a shared console, recovering from a poisoned lock.
pub fn lock_console(console: &SharedConsole) -> MutexGuard<'_, DevConsole> {
    console.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Deep copy of `value` with every field named in `fields` masked.
pub fn redact(value: &Value, fields: &[String]) -> Value {
    let mut clone = value.clone();
    mask(&mut clone, fields);
    clone
}

fn mask(value: &mut Value, fields: &[String]) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if fields.iter().any(|f| f == key) {
                    *child = Value::String(REDACTION_MASK.to_string());
                } else {
                    mask(child, fields);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| mask(item, fields)),
        _ => {}
    }
}
