//! Loading and saving `config.toml`.

use std::path::{Path, PathBuf};

use pw_core::config::AppConfig;
use pw_core::error::{PwError, Result};

use crate::paths::PwPaths;
use crate::storage::DocumentStorage;

/// Reads and writes the application configuration file.
///
/// A missing or blank file yields [`AppConfig::default`]; unknown keys are
/// ignored and missing keys take their defaults.
#[derive(Debug, Clone)]
pub struct ConfigService {
    storage: DocumentStorage,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            storage: DocumentStorage::toml(path),
        }
    }

    pub fn default_location(paths: &PwPaths) -> Result<Self> {
        Ok(Self::new(paths.config_file()?))
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn load(&self) -> Result<AppConfig> {
        match self.storage.load()? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                PwError::config(format!(
                    "Invalid configuration in {}: {}",
                    self.path().display(),
                    e
                ))
            }),
            None => {
                tracing::debug!("No config at {}, using defaults", self.path().display());
                Ok(AppConfig::default())
            }
        }
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let value = serde_json::to_value(config)?;
        self.storage.save_locked(&value)?;
        Ok(())
    }
}
