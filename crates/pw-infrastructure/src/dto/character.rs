//! Character DTOs and migrations
//!
//! ## Version History
//! - **1.0.0**: Legacy records. Species lives in a flat `appearanceSpecies`
//!   field and timestamps may be missing.
//! - **2.0.0**: Species nested under `appearance`, timestamps required.

use serde::{Deserialize, Serialize};
use version_migrate::{FromDomain, IntoDomain, MigratesTo, Versioned};

use pw_core::character::{
    Appearance, CHARACTER_VERSION, Character, Gender, Narrative, Relationship, Voice, now_millis,
};

/// Character record V1.0.0 (legacy).
#[derive(Debug, Clone, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
#[serde(rename_all = "camelCase")]
pub struct CharacterV1_0_0 {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Species before it moved into the appearance block.
    #[serde(default)]
    pub appearance_species: String,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub narrative: Narrative,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Character record V2.0.0.
#[derive(Debug, Clone, Serialize, Deserialize, Versioned)]
#[versioned(version = "2.0.0")]
#[serde(rename_all = "camelCase")]
pub struct CharacterV2_0_0 {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub narrative: Narrative,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// Migration implementations
// ============================================================================

/// Migration from CharacterV1_0_0 to CharacterV2_0_0.
///
/// `appearanceSpecies` fills `appearance.species` only when the nested field
/// is empty. Missing `createdAt` becomes now; missing `updatedAt` copies it.
impl MigratesTo<CharacterV2_0_0> for CharacterV1_0_0 {
    fn migrate(self) -> CharacterV2_0_0 {
        let mut appearance = self.appearance;
        if appearance.species.is_empty() && !self.appearance_species.is_empty() {
            appearance.species = self.appearance_species;
        }
        let created_at = self.created_at.unwrap_or_else(now_millis);
        let updated_at = self.updated_at.unwrap_or(created_at);

        CharacterV2_0_0 {
            id: self.id,
            name: self.name,
            role: self.role,
            gender: self.gender,
            age: self.age,
            traits: self.traits,
            goals: self.goals,
            tags: self.tags,
            appearance,
            voice: self.voice,
            narrative: self.narrative,
            relationships: self.relationships,
            created_at,
            updated_at,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl IntoDomain<Character> for CharacterV2_0_0 {
    fn into_domain(self) -> Character {
        Character {
            id: self.id,
            name: self.name,
            role: self.role,
            gender: self.gender,
            age: self.age,
            traits: self.traits,
            goals: self.goals,
            tags: self.tags,
            appearance: self.appearance,
            voice: self.voice,
            narrative: self.narrative,
            relationships: self.relationships,
            schema_version: CHARACTER_VERSION,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

impl FromDomain<Character> for CharacterV2_0_0 {
    fn from_domain(character: Character) -> Self {
        let created_at = character.created_at.unwrap_or_else(now_millis);
        CharacterV2_0_0 {
            id: character.id,
            name: character.name,
            role: character.role,
            gender: character.gender,
            age: character.age,
            traits: character.traits,
            goals: character.goals,
            tags: character.tags,
            appearance: character.appearance,
            voice: character.voice,
            narrative: character.narrative,
            relationships: character.relationships,
            created_at,
            updated_at: character.updated_at.unwrap_or(created_at),
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Entity name of character records.
pub const CHARACTER_ENTITY: &str = "character";

/// Creates a Migrator for Character records.
pub fn create_character_migrator() -> version_migrate::Migrator {
    let mut migrator = version_migrate::Migrator::builder().build();
    let path = version_migrate::Migrator::define(CHARACTER_ENTITY)
        .from::<CharacterV1_0_0>()
        .step::<CharacterV2_0_0>()
        .into_with_save::<Character>();
    migrator
        .register(path)
        .expect("Failed to register character migration path");
    migrator
}
