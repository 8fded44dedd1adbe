//! Character domain model.
//!
//! A character is the persona authored in the Studio and chatted with on the
//! Stage. The wire shape (bundles, persisted records) uses camelCase keys.

use serde::{Deserialize, Serialize};

use super::voice::Voice;

/// Current schema version stamped on every record the Studio saves.
pub const CHARACTER_VERSION: u32 = 2;

/// Gender options offered by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    /// Anything the editor does not recognize (including an empty string).
    #[default]
    #[serde(other)]
    Unspecified,
}

impl Gender {
    /// Parses a free-form gender string, falling back to `Unspecified`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "non-binary" => Gender::NonBinary,
            _ => Gender::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non-binary",
            Gender::Unspecified => "",
        }
    }

    /// Noun used when composing the appearance line ("elf woman").
    pub fn noun(&self) -> &'static str {
        match self {
            Gender::Male => "man",
            Gender::Female => "woman",
            Gender::NonBinary => "person",
            Gender::Unspecified => "",
        }
    }
}

/// Physical description of a character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appearance {
    pub nsfw_allowed: bool,
    pub species: String,
    pub build: String,
    pub skin_tone: String,
    pub hair_style: String,
    pub hair_color: String,
    pub eye_color: String,
    pub eye_shape: String,
    pub clothing_style: String,
    pub notable_marks: Vec<String>,
}

/// Five-beat story outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryBeats {
    pub hook: String,
    pub complication: String,
    pub midpoint: String,
    pub crisis: String,
    pub resolution: String,
}

/// Narrative block: logline, pillars and optional beats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Narrative {
    pub logline: String,
    pub pillars: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beats: Option<StoryBeats>,
}

impl Default for Narrative {
    fn default() -> Self {
        Self {
            logline: String::new(),
            pillars: vec![String::new(); 3],
            beats: None,
        }
    }
}

/// A relationship to another person in the character's world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub person: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
}

/// A persona record.
///
/// `id` is assigned once (by the Studio or by bundle import) and never
/// reused. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
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
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Character {
    fn default() -> Self {
        Self::empty()
    }
}

impl Character {
    /// A blank record as the editor presents it: no id yet, male by default.
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            role: String::new(),
            gender: Gender::Male,
            age: None,
            traits: Vec::new(),
            goals: Vec::new(),
            tags: Vec::new(),
            appearance: Appearance::default(),
            voice: Voice::default(),
            narrative: Narrative::default(),
            relationships: Vec::new(),
            schema_version: CHARACTER_VERSION,
            created_at: None,
            updated_at: None,
        }
    }

    /// Convenience constructor used by demos and tests.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::empty()
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_round_trips_kebab_case() {
        let json = serde_json::to_string(&Gender::NonBinary).unwrap();
        assert_eq!(json, "\"non-binary\"");
        let parsed: Gender = serde_json::from_str("\"female\"").unwrap();
        assert_eq!(parsed, Gender::Female);
    }

    #[test]
    fn unknown_gender_is_unspecified() {
        let parsed: Gender = serde_json::from_str("\"robot\"").unwrap();
        assert_eq!(parsed, Gender::Unspecified);
        assert_eq!(Gender::parse(""), Gender::Unspecified);
    }

    #[test]
    fn sparse_record_deserializes_with_defaults() {
        let c: Character = serde_json::from_str(r#"{"id":"aria-001","name":"Aria"}"#).unwrap();
        assert_eq!(c.name, "Aria");
        assert!(c.traits.is_empty());
        assert_eq!(c.schema_version, 1);
        assert!(c.voice.archetype.is_none());
    }

    #[test]
    fn relationship_uses_type_key() {
        let rel = Relationship {
            person: "Daren".into(),
            kind: "ally".into(),
            role: String::new(),
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "ally");
    }
}
