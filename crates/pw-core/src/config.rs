//! Application configuration and the key/value settings seam.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::CharacterBundle;
use crate::error::Result;
use crate::platform::PlatformKind;
use crate::telemetry::DevConsoleConfig;

/// Settings key of the UI theme.
pub const THEME_KEY: &str = "theme";

/// Contents of `config.toml`.
///
/// Every field has a default, so a missing or partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Provider used when nothing else selects one.
    pub environment: PlatformKind,
    pub dev_console: DevConsoleConfig,
    pub stage: StageSettings,
}

/// Parameters of the simulated chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Artificial latency before the echoed reply lands.
    pub reply_delay_ms: u64,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            model: "mock".to_string(),
            endpoint: "/mock/demo".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            reply_delay_ms: 120,
        }
    }
}

impl StageSettings {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

/// UI color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Stored theme, or the default when unset or unreadable.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        Ok(store
            .get(THEME_KEY)
            .await?
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default())
    }

    pub async fn save(self, store: &dyn SettingsStore) -> Result<()> {
        store.set(THEME_KEY, Value::String(self.as_str().to_string())).await
    }
}

/// Key/value settings persistence (dotted keys such as `devConsole.level`).
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Storage for the bundle the Stage is working on.
#[async_trait::async_trait]
pub trait BundleStore: Send + Sync {
    /// The saved bundle document, if any.
    async fn load(&self) -> Result<Option<Value>>;

    async fn save(&self, bundle: &CharacterBundle) -> Result<()>;
}
