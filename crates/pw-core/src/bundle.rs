//! Character bundle format.
//!
//! A bundle is the JSON document the Studio exports and the Stage imports:
//! `{ brand, type, version, exportedAt, characters }`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::character::{Appearance, Character, Gender, Narrative, Relationship, Voice};
use crate::error::{PwError, Result};

pub const BUNDLE_TYPE: &str = "personaworks.characters";
/// Older exports used this type string; still accepted on import.
pub const LEGACY_BUNDLE_TYPE: &str = "perchance.characters";
pub const BUNDLE_VERSION: u32 = 1;
pub const BUNDLE_BRAND: &str = "PersonaWorks";

const UNNAMED: &str = "Unnamed Character";

/// An exported set of characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub exported_at: String,
    pub characters: Vec<Character>,
}

impl CharacterBundle {
    /// A fresh export of `characters`, stamped now.
    pub fn export(characters: Vec<Character>) -> Self {
        Self {
            brand: Some(BUNDLE_BRAND.to_string()),
            kind: BUNDLE_TYPE.to_string(),
            version: BUNDLE_VERSION,
            exported_at: iso_now(),
            characters,
        }
    }

    /// Same bundle without a brand, as the Stage persists its working copy.
    pub fn unbranded(characters: Vec<Character>, exported_at: impl Into<String>) -> Self {
        Self {
            brand: None,
            kind: BUNDLE_TYPE.to_string(),
            version: BUNDLE_VERSION,
            exported_at: exported_at.into(),
            characters,
        }
    }
}

/// Outcome of a repository import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub ok: usize,
    pub fail: usize,
}

/// Current time as an RFC 3339 string with milliseconds (`...Z`).
pub fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Checks `type` and `version` of a bundle document.
///
/// `type` must be the current or legacy bundle type; `version`, when
/// present, must be a number of at least 1.
pub fn validate_header(value: &Value) -> Result<()> {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if kind != BUNDLE_TYPE && kind != LEGACY_BUNDLE_TYPE {
        return Err(PwError::validation("Wrong bundle type"));
    }
    match value.get("version") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v >= 1.0) => {}
        Some(_) => return Err(PwError::validation("Unsupported bundle version")),
    }
    Ok(())
}

fn characters_of(value: &Value) -> Result<&Vec<Value>> {
    value
        .get("characters")
        .and_then(Value::as_array)
        .ok_or_else(|| PwError::validation("Bundle characters must be a list"))
}

/// Parses a bundle strictly: each character must deserialize as a
/// [`Character`]. Returns the bundle and the number of rejected records.
pub fn parse_bundle(value: &Value) -> Result<(CharacterBundle, usize)> {
    validate_header(value)?;
    let mut rejected = 0;
    let mut characters = Vec::new();
    for raw in characters_of(value)? {
        match serde_json::from_value::<Character>(migrate_legacy_fields(raw.clone())) {
            Ok(c) => characters.push(c),
            Err(e) => {
                tracing::warn!("Skipping malformed character in bundle: {}", e);
                rejected += 1;
            }
        }
    }
    let bundle = CharacterBundle {
        brand: value.get("brand").and_then(Value::as_str).map(str::to_string),
        kind: BUNDLE_TYPE.to_string(),
        version: BUNDLE_VERSION,
        exported_at: exported_at_of(value),
        characters,
    };
    Ok((bundle, rejected))
}

/// Parses a bundle permissively, the way the Stage imports it.
///
/// Every character is coerced field by field: strings from anything
/// scalar, lists trimmed with blanks dropped, a numeric age rounded to
/// the nearest year or none,
/// `Unnamed Character` when the name is missing, and generated ids and
/// timestamps when absent.
pub fn parse_stage_bundle(value: &Value, now: i64) -> Result<CharacterBundle> {
    validate_header(value)?;
    let characters = characters_of(value)?
        .iter()
        .map(|raw| coerce_character(raw, now))
        .collect();
    Ok(CharacterBundle {
        brand: None,
        kind: BUNDLE_TYPE.to_string(),
        version: BUNDLE_VERSION,
        exported_at: exported_at_of(value),
        characters,
    })
}

fn exported_at_of(value: &Value) -> String {
    value
        .get("exportedAt")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(iso_now)
}

fn coerce_character(raw: &Value, now: i64) -> Character {
    let field = |key: &str| raw.get(key).unwrap_or(&Value::Null);

    let id = coerce_string(field("id"));
    let id = if id.is_empty() { generated_id(now) } else { id };
    let name = coerce_string(field("name"));
    let name = if name.is_empty() { UNNAMED.to_string() } else { name };

    let mut appearance: Appearance = serde_json::from_value(field("appearance").clone()).unwrap_or_default();
    appearance.species = coerce_string(
        raw.get("appearance")
            .and_then(|a| a.get("species"))
            .or_else(|| raw.get("appearanceSpecies"))
            .unwrap_or(&Value::Null),
    );

    Character {
        id,
        name,
        role: coerce_string(field("role")),
        gender: Gender::parse(&coerce_string(field("gender"))),
        age: field("age").as_f64().filter(|a| a.is_finite() && *a >= 0.0).map(|a| a.round() as u32),
        traits: coerce_list(field("traits")),
        goals: coerce_list(field("goals")),
        tags: coerce_list(field("tags")),
        appearance,
        voice: serde_json::from_value::<Voice>(field("voice").clone()).unwrap_or_default(),
        narrative: serde_json::from_value::<Narrative>(field("narrative").clone()).unwrap_or_default(),
        relationships: serde_json::from_value::<Vec<Relationship>>(field("relationships").clone())
            .unwrap_or_default(),
        schema_version: field("schemaVersion").as_u64().map(|v| v as u32).unwrap_or(1),
        created_at: Some(field("createdAt").as_i64().unwrap_or(now)),
        updated_at: Some(field("updatedAt").as_i64().unwrap_or(now)),
    }
}

/// Moves a legacy top-level `appearanceSpecies` into `appearance.species`.
pub fn migrate_legacy_fields(mut raw: Value) -> Value {
    if let Some(obj) = raw.as_object_mut() {
        if let Some(species) = obj.remove("appearanceSpecies") {
            let appearance = obj
                .entry("appearance")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(a) = appearance.as_object_mut() {
                let missing = a
                    .get("species")
                    .and_then(Value::as_str)
                    .is_none_or(str::is_empty);
                if missing {
                    a.insert("species".to_string(), species);
                }
            }
        }
    }
    raw
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => String::new(),
    }
}

fn coerce_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|v| coerce_string(v).trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn generated_id(now: i64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{now}{suffix}")
}

/// The built-in demo cast as a bundle document.
pub fn demo_bundle(now: i64) -> Value {
    let demo = |id: &str, name: &str, role: &str, gender: &str, age: u32, traits: [&str; 2], tags: [&str; 2], species: &str| {
        json!({
            "id": id,
            "name": name,
            "role": role,
            "gender": gender,
            "age": age,
            "traits": traits,
            "tags": tags,
            "appearance": { "species": species },
            "schemaVersion": 1,
            "createdAt": now,
            "updatedAt": now,
        })
    };
    json!({
        "type": BUNDLE_TYPE,
        "version": BUNDLE_VERSION,
        "exportedAt": iso_now(),
        "characters": [
            demo("aria-001", "Aria Farwind", "Scout", "female", 27, ["brave", "curious"], ["npc", "riverfolk"], "elf"),
            demo("daren-002", "Daren Blackwood", "Quartermaster", "male", 33, ["pragmatic", "dry humor"], ["guild", "trusted"], "human"),
            demo("mira-003", "Mira Stoneveil", "Archivist", "female", 41, ["methodical", "kind"], ["npc", "library"], "dwarf"),
            demo("vex-004", "Vex Talon", "Smuggler", "non-binary", 29, ["witty", "reckless"], ["underworld", "pilot"], "tiefling"),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_type_is_rejected() {
        let err = parse_stage_bundle(&json!({"type": "other", "version": 1, "characters": []}), 0).unwrap_err();
        assert_eq!(err.to_string(), "Wrong bundle type");
    }

    #[test]
    fn bad_version_is_rejected() {
        let err = validate_header(&json!({"type": BUNDLE_TYPE, "version": 0})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported bundle version");
        assert!(validate_header(&json!({"type": BUNDLE_TYPE, "version": "1"})).is_err());
        assert!(validate_header(&json!({"type": LEGACY_BUNDLE_TYPE})).is_ok());
    }

    #[test]
    fn characters_must_be_a_list() {
        let err = parse_stage_bundle(&json!({"type": BUNDLE_TYPE, "version": 1, "characters": {}}), 0).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn stage_import_coerces_fields() {
        let doc = json!({
            "type": BUNDLE_TYPE,
            "version": 1,
            "exportedAt": "2024-01-01T00:00:00.000Z",
            "characters": [
                {"name": 42, "traits": [" brave ", "", null], "age": "old", "appearanceSpecies": "elf"},
                {"id": "x", "name": "", "age": 30, "createdAt": 5}
            ]
        });
        let bundle = parse_stage_bundle(&doc, 1_000).unwrap();
        let first = &bundle.characters[0];
        assert_eq!(first.name, "42");
        assert!(first.id.starts_with("1000"));
        assert_eq!(first.traits, vec!["brave"]);
        assert_eq!(first.age, None);
        assert_eq!(first.appearance.species, "elf");
        assert_eq!(first.schema_version, 1);
        assert_eq!(first.created_at, Some(1_000));

        let second = &bundle.characters[1];
        assert_eq!(second.name, "Unnamed Character");
        assert_eq!(second.age, Some(30));
        assert_eq!(second.created_at, Some(5));
        assert_eq!(bundle.exported_at, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn stage_import_rounds_fractional_age() {
        let doc = json!({
            "type": BUNDLE_TYPE,
            "characters": [{"name": "A", "age": 27.5}, {"name": "B", "age": 30.2}]
        });
        let bundle = parse_stage_bundle(&doc, 0).unwrap();
        assert_eq!(bundle.characters[0].age, Some(28));
        assert_eq!(bundle.characters[1].age, Some(30));
    }

    #[test]
    fn strict_parse_counts_rejects() {
        let doc = json!({
            "type": LEGACY_BUNDLE_TYPE,
            "characters": [{"id": "a", "name": "A"}, {"name": 3}]
        });
        let (bundle, rejected) = parse_bundle(&doc).unwrap();
        assert_eq!(bundle.characters.len(), 1);
        assert_eq!(bundle.kind, BUNDLE_TYPE);
        assert_eq!(rejected, 1);
    }

    #[test]
    fn export_has_brand_and_type() {
        let bundle = CharacterBundle::export(vec![Character::named("a", "A")]);
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["brand"], "PersonaWorks");
        assert_eq!(json["type"], BUNDLE_TYPE);
        assert_eq!(json["version"], 1);
        assert!(json.get("appearanceSpecies").is_none());
    }

    #[test]
    fn demo_bundle_parses() {
        let bundle = parse_stage_bundle(&demo_bundle(7), 7).unwrap();
        let names: Vec<_> = bundle.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Aria Farwind", "Daren Blackwood", "Mira Stoneveil", "Vex Talon"]);
        assert_eq!(bundle.characters[3].gender, Gender::NonBinary);
        assert_eq!(bundle.characters[2].appearance.species, "dwarf");
    }
}
