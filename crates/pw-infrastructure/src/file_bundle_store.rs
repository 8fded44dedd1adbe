//! File-backed storage for the bundle the Stage is working on.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use pw_core::bundle::CharacterBundle;
use pw_core::config::BundleStore;
use pw_core::error::{PwError, Result};

use crate::paths::PwPaths;
use crate::storage::DocumentStorage;

pub struct FileBundleStore {
    storage: DocumentStorage,
}

impl FileBundleStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            storage: DocumentStorage::json(path),
        }
    }

    pub fn default_location(paths: &PwPaths) -> Result<Self> {
        Ok(Self::new(paths.bundle_file()?))
    }
}

#[async_trait]
impl BundleStore for FileBundleStore {
    async fn load(&self) -> Result<Option<Value>> {
        let storage = self.storage.clone();
        let value = tokio::task::spawn_blocking(move || storage.load())
            .await
            .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;
        Ok(value)
    }

    async fn save(&self, bundle: &CharacterBundle) -> Result<()> {
        let value = serde_json::to_value(bundle)?;
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || storage.save_locked(&value))
            .await
            .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;
        tracing::debug!(
            "Saved stage bundle ({} characters) to {}",
            bundle.characters.len(),
            self.storage.path().display()
        );
        Ok(())
    }
}
