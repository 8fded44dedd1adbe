//! PersonaWorks infrastructure: file-backed persistence.
//!
//! Character records, the Stage bundle, key/value settings and `config.toml`
//! all live under the directories resolved by [`PwPaths`].

pub mod config_service;
pub mod dto;
pub mod file_bundle_store;
pub mod file_character_repository;
pub mod paths;
pub mod storage;
pub mod toml_settings_store;

pub use crate::config_service::ConfigService;
pub use crate::file_bundle_store::FileBundleStore;
pub use crate::file_character_repository::FileCharacterRepository;
pub use crate::paths::{PathError, PwPaths};
pub use crate::toml_settings_store::TomlSettingsStore;
