//! Character repository trait.
//!
//! Defines the interface for character persistence operations.

use super::model::Character;
use crate::bundle::{CharacterBundle, ImportSummary};
use crate::error::Result;

/// An abstract repository for saved characters.
///
/// Implementations own schema versioning of the stored records. `save`
/// normalizes the record (see [`normalize_character`](super::normalize_character))
/// and keeps the `createdAt` of an existing record with the same id; `put`
/// stores the record as given.
#[async_trait::async_trait]
pub trait CharacterRepository: Send + Sync {
    /// Returns every stored character.
    async fn list(&self) -> Result<Vec<Character>>;

    /// Looks up a character by id.
    async fn get(&self, id: &str) -> Result<Option<Character>>;

    /// Normalizes and upserts a character, returning the stored record.
    async fn save(&self, character: &Character) -> Result<Character>;

    /// Upserts a record without normalization.
    async fn put(&self, character: &Character) -> Result<()>;

    /// Removes a character. Returns `false` when nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Wraps every stored character into an export bundle.
    async fn export_all(&self) -> Result<CharacterBundle> {
        let characters = self.list().await?;
        Ok(CharacterBundle::export(characters))
    }

    /// Stores each character of `bundle`, counting successes and failures.
    async fn import_bundle(&self, bundle: &CharacterBundle) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for character in &bundle.characters {
            match self.put(character).await {
                Ok(()) => summary.ok += 1,
                Err(e) => {
                    tracing::warn!("Failed to import character '{}': {}", character.id, e);
                    summary.fail += 1;
                }
            }
        }
        Ok(summary)
    }
}
