//! File-backed CharacterRepository implementation.
//!
//! One versioned JSON document per character, written atomically through
//! [`DocumentStorage`]. Records of older schema versions are migrated on read
//! and rewritten in the latest version on the next save.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use version_migrate::Migrator;

use pw_core::character::{Character, CharacterRepository, normalize_character, now_millis};
use pw_core::error::{PwError, Result};

use crate::dto::{CHARACTER_ENTITY, create_character_migrator};
use crate::paths::PwPaths;
use crate::storage::DocumentStorage;

/// Directory structure:
/// ```text
/// base_dir/
/// ├── aria-001.json
/// ├── 0b7c...-uuid.json
/// └── odd%2Fid.json        # ids are percent-encoded when needed
/// ```
pub struct FileCharacterRepository {
    base_dir: PathBuf,
    migrator: Migrator,
}

impl FileCharacterRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            migrator: create_character_migrator(),
        }
    }

    /// Repository under the `characters` directory of `paths`.
    pub fn default_location(paths: &PwPaths) -> Result<Self> {
        Ok(Self::new(paths.characters_dir()?))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", file_stem(id)))
    }

    /// Migrates a raw record to the domain model.
    ///
    /// Records written before versioning carry no `version` key and are
    /// treated as 1.0.0.
    fn decode(&self, mut raw: Value) -> Result<Character> {
        if let Value::Object(map) = &mut raw {
            map.entry("version")
                .or_insert_with(|| Value::String("1.0.0".to_string()));
        }
        self.migrator
            .load_flat_from(CHARACTER_ENTITY, raw)
            .map_err(|e| PwError::migration(format!("Failed to migrate character: {}", e)))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<Character>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw: Value = serde_json::from_str(&content)?;
        self.decode(raw).map(Some)
    }

    async fn write_record(&self, character: &Character) -> Result<()> {
        if !character.has_id() {
            return Err(PwError::validation("id: required"));
        }
        let serialized = self
            .migrator
            .save_domain_flat(CHARACTER_ENTITY, character.clone())
            .map_err(|e| PwError::json(format!("Failed to serialize character: {}", e)))?;
        let value: Value = serde_json::from_str(&serialized)?;

        let storage = DocumentStorage::json(self.record_path(&character.id));
        tokio::task::spawn_blocking(move || storage.save_locked(&value))
            .await
            .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;
        Ok(())
    }
}

#[async_trait]
impl CharacterRepository for FileCharacterRepository {
    async fn list(&self) -> Result<Vec<Character>> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut characters = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            match self.read_record(&path).await {
                Ok(Some(character)) => characters.push(character),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable character file {}: {}", path.display(), e),
            }
        }

        characters.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(characters)
    }

    async fn get(&self, id: &str) -> Result<Option<Character>> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        self.read_record(&self.record_path(id)).await
    }

    async fn save(&self, character: &Character) -> Result<Character> {
        let existing_created = if character.has_id() {
            self.get(&character.id)
                .await?
                .and_then(|existing| existing.created_at)
        } else {
            None
        };

        let mut normalized = normalize_character(character.clone(), now_millis());
        if existing_created.is_some() {
            normalized.created_at = existing_created;
        }
        self.write_record(&normalized).await?;
        tracing::debug!("Saved character '{}' ({})", normalized.name, normalized.id);
        Ok(normalized)
    }

    async fn put(&self, character: &Character) -> Result<()> {
        self.write_record(character).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        let storage = DocumentStorage::json(self.record_path(id));
        let removed = tokio::task::spawn_blocking(move || storage.remove())
            .await
            .map_err(|e| PwError::internal(format!("Failed to join task: {}", e)))??;
        Ok(removed)
    }
}

/// File stem for an id: ASCII alphanumerics, `-` and `_` pass through,
/// every other byte is percent-encoded.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}
