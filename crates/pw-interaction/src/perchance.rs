//! Perchance provider.
//!
//! Raw data comes from a [`PerchanceBridge`], the seam to whatever hosts
//! the Perchance lists, archetype map and AI plugin. [`StaticBridge`] serves
//! them from an in-memory document.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use pw_core::character::{Archetype, ArchetypeSummary, Gender};
use pw_core::error::Result;
use pw_core::platform::{
    Capabilities, ListDialect, Platform, clip, normalize_archetype, normalize_list,
};

use crate::local::VOICE_ARCHETYPES_LIST;

const COMPLETION_PREVIEW: usize = 200;

/// Access to Perchance-hosted data.
///
/// `Ok(None)` means "not provided"; errors are logged by the provider.
#[async_trait]
pub trait PerchanceBridge: Send + Sync {
    async fn get_list_raw(&self, name: &str) -> anyhow::Result<Option<Value>>;

    async fn get_archetype_raw(&self, name: &str) -> anyhow::Result<Option<Value>>;

    /// Completion from the AI plugin, when one is installed.
    async fn ai_complete(&self, prompt: &str) -> anyhow::Result<Option<String>>;
}

/// Bridge over a fixed document:
///
/// ```json
/// { "lists": { "species": "Elf\nHuman|20" }, "archetypes": { "Sage": { ... } } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticBridge {
    #[serde(default)]
    lists: HashMap<String, Value>,
    #[serde(default)]
    archetypes: HashMap<String, Value>,
}

impl StaticBridge {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads the document at `path`; a missing file gives an empty bridge.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_value(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn with_list(mut self, name: impl Into<String>, raw: Value) -> Self {
        self.lists.insert(name.into(), raw);
        self
    }

    pub fn with_archetype(mut self, name: impl Into<String>, raw: Value) -> Self {
        self.archetypes.insert(name.into(), raw);
        self
    }
}

#[async_trait]
impl PerchanceBridge for StaticBridge {
    async fn get_list_raw(&self, name: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.lists.get(name).cloned())
    }

    async fn get_archetype_raw(&self, name: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.archetypes.get(name).cloned())
    }

    async fn ai_complete(&self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
impl<T: PerchanceBridge + ?Sized> PerchanceBridge for std::sync::Arc<T> {
    async fn get_list_raw(&self, name: &str) -> anyhow::Result<Option<Value>> {
        (**self).get_list_raw(name).await
    }

    async fn get_archetype_raw(&self, name: &str) -> anyhow::Result<Option<Value>> {
        (**self).get_archetype_raw(name).await
    }

    async fn ai_complete(&self, prompt: &str) -> anyhow::Result<Option<String>> {
        (**self).ai_complete(prompt).await
    }
}

pub struct PerchancePlatform<B> {
    bridge: B,
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl<B: PerchanceBridge> PerchancePlatform<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

#[async_trait]
impl<B: PerchanceBridge> Platform for PerchancePlatform<B> {
    fn id(&self) -> &str {
        "perchance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lists: true,
            ai: true,
        }
    }

    async fn get_list(&self, name: &str) -> Vec<String> {
        if let Some(cached) = self.lists.lock().await.get(name) {
            return cached.clone();
        }

        let list = match self.bridge.get_list_raw(name).await {
            Ok(Some(raw)) => normalize_list(&raw, ListDialect::Perchance),
            Ok(None) => {
                tracing::warn!("[perchance] list not found: {}", name);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("[perchance] list '{}' failed: {}", name, e);
                Vec::new()
            }
        };

        self.lists
            .lock()
            .await
            .entry(name.to_string())
            .or_insert(list)
            .clone()
    }

    /// Archetype names double as ids here.
    async fn get_voice_archetypes(&self) -> Vec<ArchetypeSummary> {
        self.get_list(VOICE_ARCHETYPES_LIST)
            .await
            .into_iter()
            .map(|name| ArchetypeSummary {
                id: name.clone(),
                name,
            })
            .collect()
    }

    async fn get_archetype(&self, name: &str) -> Option<Archetype> {
        if name.is_empty() {
            return None;
        }
        match self.bridge.get_archetype_raw(name).await {
            Ok(Some(raw)) if !raw.is_null() => Some(normalize_archetype(&raw, name)),
            Ok(_) => {
                tracing::warn!("[perchance] archetype not found: {}", name);
                None
            }
            Err(e) => {
                tracing::warn!("[perchance] archetype '{}' failed: {}", name, e);
                None
            }
        }
    }

    async fn ai_complete(&self, prompt: &str) -> String {
        match self.bridge.ai_complete(prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => format!("[[PC AI MOCK]] {}…", clip(prompt, COMPLETION_PREVIEW)),
            Err(e) => {
                tracing::warn!("[perchance] AI completion failed: {}", e);
                format!("[[PC AI MOCK]] {}…", clip(prompt, COMPLETION_PREVIEW))
            }
        }
    }

    async fn get_random_name(&self, _gender: Gender) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBridge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PerchanceBridge for CountingBridge {
        async fn get_list_raw(&self, _name: &str) -> anyhow::Result<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!("a\nb")))
        }

        async fn get_archetype_raw(&self, _name: &str) -> anyhow::Result<Option<Value>> {
            anyhow::bail!("bridge offline")
        }

        async fn ai_complete(&self, prompt: &str) -> anyhow::Result<Option<String>> {
            Ok(Some(format!("echo: {prompt}")))
        }
    }

    #[tokio::test]
    async fn test_list_strips_comments_and_weights() {
        let bridge = StaticBridge::default()
            .with_list("species", json!("Elf|20\n# heading\nHuman # common\nelf"));
        let platform = PerchancePlatform::new(bridge);
        assert_eq!(platform.get_list("species").await, vec!["Elf", "Human"]);
        assert!(platform.get_list("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_lists_are_memoized() {
        let platform = PerchancePlatform::new(CountingBridge {
            calls: AtomicUsize::new(0),
        });
        platform.get_list("x").await;
        platform.get_list("x").await;
        assert_eq!(platform.bridge().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_archetypes_by_name() {
        let bridge = StaticBridge::default()
            .with_list(VOICE_ARCHETYPES_LIST, json!(["Sage", "Rogue"]))
            .with_archetype("Sage", json!({"formality": 80, "addressing": "formal"}));
        let platform = PerchancePlatform::new(bridge);

        let summaries = platform.get_voice_archetypes().await;
        assert_eq!(summaries[0].id, "Sage");
        assert_eq!(summaries[0].name, "Sage");

        let sage = platform.get_archetype("Sage").await.unwrap();
        assert_eq!(sage.id, "sage");
        assert_eq!(sage.name, "Sage");
        assert_eq!(sage.addressing_style, "formal");
        assert!(platform.get_archetype("Rogue").await.is_none());
        assert!(platform.get_archetype("").await.is_none());
    }

    #[tokio::test]
    async fn test_bridge_errors_degrade() {
        let platform = PerchancePlatform::new(CountingBridge {
            calls: AtomicUsize::new(0),
        });
        assert!(platform.get_archetype("Sage").await.is_none());
        assert_eq!(platform.ai_complete("hi").await, "echo: hi");
    }

    #[tokio::test]
    async fn test_ai_fallback_and_no_names() {
        let platform = PerchancePlatform::new(StaticBridge::default());
        assert_eq!(platform.ai_complete("hello").await, "[[PC AI MOCK]] hello…");
        assert!(platform.get_random_name(Gender::Female).await.is_none());
    }
}
