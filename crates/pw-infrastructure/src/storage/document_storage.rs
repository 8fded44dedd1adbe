//! Single-document file storage with atomic writes.
//!
//! Every persisted file in PersonaWorks (settings, config, the Stage bundle,
//! each character record) is one JSON or TOML document. Data crosses this
//! layer as `serde_json::Value` so callers never see TOML specifics.

use serde_json::Value as JsonValue;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use pw_core::error::PwError;

/// Errors that can occur during document storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// File I/O error.
    IoError(std::io::Error),
    /// TOML parsing error.
    TomlParseError(toml::de::Error),
    /// TOML serialization error.
    TomlSerError(toml::ser::Error),
    /// JSON parse or conversion error.
    JsonError(serde_json::Error),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(e) => write!(f, "I/O error: {}", e),
            StorageError::TomlParseError(e) => write!(f, "TOML parse error: {}", e),
            StorageError::TomlSerError(e) => write!(f, "TOML serialization error: {}", e),
            StorageError::JsonError(e) => write!(f, "JSON conversion error: {}", e),
            StorageError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::IoError(e)
    }
}

impl From<toml::de::Error> for StorageError {
    fn from(e: toml::de::Error) -> Self {
        StorageError::TomlParseError(e)
    }
}

impl From<toml::ser::Error> for StorageError {
    fn from(e: toml::ser::Error) -> Self {
        StorageError::TomlSerError(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::JsonError(e)
    }
}

impl From<StorageError> for PwError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IoError(e) => PwError::from(e),
            StorageError::TomlParseError(e) => PwError::from(e),
            StorageError::TomlSerError(e) => PwError::from(e),
            StorageError::JsonError(e) => PwError::from(e),
            StorageError::LockError(msg) => PwError::io(msg),
        }
    }
}

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Json,
    Toml,
}

/// A file holding one document.
///
/// Provides:
/// - **Atomicity**: writes go to `.<name>.tmp`, are fsynced, then renamed
/// - **Isolation**: `update` and `save_locked` hold an exclusive `.lock` file
/// - **Format conversion**: TOML and JSON both surface as `serde_json::Value`
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    path: PathBuf,
    format: StorageFormat,
}

impl DocumentStorage {
    pub fn new(path: PathBuf, format: StorageFormat) -> Self {
        Self { path, format }
    }

    pub fn json(path: PathBuf) -> Self {
        Self::new(path, StorageFormat::Json)
    }

    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, StorageFormat::Toml)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// Returns `Ok(None)` when the file is missing or blank.
    pub fn load(&self) -> Result<Option<JsonValue>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let value = match self.format {
            StorageFormat::Json => serde_json::from_str(&content)?,
            StorageFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(&content)?;
                toml_to_json(toml_value)?
            }
        };
        Ok(Some(value))
    }

    /// Writes the document atomically (tmp file + rename).
    pub fn save(&self, data: &JsonValue) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = match self.format {
            StorageFormat::Json => serde_json::to_string_pretty(data)?,
            StorageFormat::Toml => toml::to_string_pretty(&json_to_toml(data)?)?,
        };

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Like [`save`](Self::save) but holds the exclusive lock while writing.
    pub fn save_locked(&self, data: &JsonValue) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        self.save(data)
    }

    /// Read-modify-write under the exclusive lock.
    ///
    /// `f` receives the current document (or `default_value` when the file
    /// is missing); the result is written back only when `f` succeeds.
    pub fn update<F>(&self, default_value: JsonValue, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut JsonValue) -> Result<(), StorageError>,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let mut data = self.load()?.unwrap_or(default_value);
        f(&mut data)?;
        self.save(&data)
    }

    /// Removes the document. Returns `false` when it did not exist.
    pub fn remove(&self) -> Result<bool, StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> Result<PathBuf, StorageError> {
        let parent = self.path.parent().ok_or_else(|| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;
        let file_name = self.path.file_name().ok_or_else(|| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive advisory lock on `<path>.lock`, released on drop.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, StorageError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| StorageError::LockError(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn toml_to_json(toml_value: toml::Value) -> Result<JsonValue, StorageError> {
    let json_str = serde_json::to_string(&toml_value)?;
    Ok(serde_json::from_str(&json_str)?)
}

fn json_to_toml(json_value: &JsonValue) -> Result<toml::Value, StorageError> {
    let json_str = serde_json::to_string(&strip_nulls(json_value))?;
    Ok(serde_json::from_str(&json_str)?)
}

/// TOML has no null; drop null object members and array items.
fn strip_nulls(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().filter(|v| !v.is_null()).map(strip_nulls).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_toml_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::toml(temp_dir.path().join("settings.toml"));

        storage
            .save(&json!({"theme": "light", "devConsole": {"maxEntries": 50, "x": null}}))
            .unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded["theme"], "light");
        assert_eq!(loaded["devConsole"]["maxEntries"], 50);
        assert!(loaded["devConsole"].get("x").is_none());
    }

    #[test]
    fn test_json_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::json(temp_dir.path().join("nested/doc.json"));

        storage.save(&json!({"characters": [], "version": 1})).unwrap();
        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded["version"], 1);
        assert!(!temp_dir.path().join("nested/.doc.json.tmp").exists());
    }

    #[test]
    fn test_load_missing_or_blank() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blank.json");
        let storage = DocumentStorage::json(path.clone());
        assert!(storage.load().unwrap().is_none());

        fs::write(&path, "   \n").unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_update_applies_default_and_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        let storage = DocumentStorage::toml(path.clone());

        storage
            .update(json!({}), |data| {
                data["theme"] = json!("dark");
                Ok(())
            })
            .unwrap();

        assert_eq!(storage.load().unwrap().unwrap()["theme"], "dark");
        assert!(!path.with_extension("lock").exists());
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::json(temp_dir.path().join("doc.json"));
        storage.save(&json!({"n": 1})).unwrap();

        let result = storage.update(json!({}), |data| {
            data["n"] = json!(2);
            Err(StorageError::LockError("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(storage.load().unwrap().unwrap()["n"], 1);
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::json(temp_dir.path().join("doc.json"));
        assert!(!storage.remove().unwrap());
        storage.save(&json!({})).unwrap();
        assert!(storage.remove().unwrap());
        assert!(!storage.path().exists());
    }
}
