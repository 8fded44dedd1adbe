//! Key/value settings persisted in a TOML file.
//!
//! Dotted keys map onto nested tables: `devConsole.level = "warn"` is stored
//! as `[devConsole] level = "warn"`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};

use pw_core::config::SettingsStore;
use pw_core::error::{PwError, Result};

use crate::paths::PwPaths;
use crate::storage::{DocumentStorage, StorageError};

pub struct TomlSettingsStore {
    storage: DocumentStorage,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            storage: DocumentStorage::toml(path),
        }
    }

    pub fn default_location(paths: &PwPaths) -> Result<Self> {
        Ok(Self::new(paths.settings_file()?))
    }
}

#[async_trait]
impl SettingsStore for TomlSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let storage = self.storage.clone();
        let document = tokio::task::spawn_blocking(move || storage.load())
            .await
            .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;

        Ok(document.and_then(|doc| lookup(&doc, key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            return Err(PwError::config(format!("Setting '{}' cannot be null", key)));
        }
        let storage = self.storage.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            storage.update(Value::Object(Map::new()), |doc| assign(doc, &key, value))
        })
        .await
        .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;
        Ok(())
    }
}

fn lookup<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(doc, |node, part| node.get(part))
}

fn assign(doc: &mut Value, key: &str, value: Value) -> std::result::Result<(), StorageError> {
    let mut node = doc;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return Ok(());
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return Ok(());
        }
        node = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}
