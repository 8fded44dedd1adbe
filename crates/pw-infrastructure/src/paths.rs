//! Unified path management for PersonaWorks files.
//!
//! Default locations come from `AppPaths` (version-migrate) so every platform
//! gets its conventional config and data directories. A base directory can be
//! supplied to redirect everything (CLI `--data-dir`, tests).

use std::path::{Path, PathBuf};

use pw_core::error::PwError;
use version_migrate::AppPaths;

const APP_NAME: &str = "personaworks";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for PwError {
    fn from(err: PathError) -> Self {
        PwError::io(err.to_string())
    }
}

/// Path resolver for PersonaWorks.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/personaworks/      # Config directory
/// ├── config.toml              # Application configuration
/// └── settings.toml            # Key/value settings (theme, dev console)
///
/// ~/.local/share/personaworks/ # Data directory
/// ├── characters/              # One JSON file per saved character
/// ├── lists/                   # Local provider lists (<name>.json)
/// ├── pw_chat_bundle.json      # Bundle last loaded into the Stage
/// └── logs/                    # Daily log files
/// ```
///
/// With a base directory both trees collapse into that directory.
#[derive(Debug, Clone, Default)]
pub struct PwPaths {
    base: Option<PathBuf>,
}

impl PwPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    fn app_paths() -> AppPaths {
        AppPaths::new(APP_NAME)
    }

    /// Returns the configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => Self::app_paths()
                .config_dir()
                .map_err(|_| PathError::HomeDirNotFound),
        }
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => Self::app_paths()
                .data_dir()
                .map_err(|_| PathError::HomeDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("settings.toml"))
    }

    pub fn characters_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("characters"))
    }

    /// Directory the local provider reads `<name>.json` lists from.
    pub fn lists_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("lists"))
    }

    pub fn bundle_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("pw_chat_bundle.json"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("logs"))
    }
}
