//! Normalization and validation applied when a character is saved, plus the
//! comma-list helpers the editor uses for chip fields.

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{CHARACTER_VERSION, Character, Gender};
use crate::error::{PwError, Result};

/// Oldest age the editor accepts.
pub const MAX_AGE: u32 = 500;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\S*").expect("valid word regex"));

/// Prepares a character for storage.
///
/// Assigns an id when missing, coerces unknown genders to male, keeps an
/// existing `createdAt`, stamps `updatedAt = now`, trims the name and drops
/// blank list entries.
pub fn normalize_character(mut character: Character, now: i64) -> Character {
    if !character.has_id() {
        character.id = uuid::Uuid::new_v4().to_string();
    }
    if character.gender == Gender::Unspecified {
        character.gender = Gender::Male;
    }
    character.created_at = Some(character.created_at.unwrap_or(now));
    character.updated_at = Some(now);
    character.name = character.name.trim().to_string();
    character.traits = clean_list(character.traits);
    character.goals = clean_list(character.goals);
    character.tags = clean_list(character.tags);
    character.schema_version = CHARACTER_VERSION;
    character
}

/// Checks the hard save rules: a name is required and age is within range.
pub fn validate_character(character: &Character) -> Result<()> {
    let mut errors = Vec::new();
    if character.name.trim().is_empty() {
        errors.push("name: required");
    }
    if character.age.is_some_and(|age| age > MAX_AGE) {
        errors.push("age: out of range");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PwError::validation(errors.join("; ")))
    }
}

/// Trims each entry and drops the empty ones.
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits on commas and line breaks, trimming and dropping blanks.
pub fn comma_split(raw: &str) -> Vec<String> {
    raw.split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Upper-cases the first letter of each word and lower-cases the rest.
pub fn title_case(raw: &str) -> String {
    WORD.replace_all(raw, |caps: &regex::Captures<'_>| {
        let word = &caps[0];
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    })
    .into_owned()
}

/// Appends each comma-separated entry (title-cased) that is not already in
/// `list`, comparing case-insensitively. Returns whether anything was added.
pub fn add_from_comma(list: &mut Vec<String>, raw: &str) -> bool {
    let mut changed = false;
    for item in comma_split(raw).iter().map(|s| title_case(s)) {
        let lower = item.to_lowercase();
        if !list.iter().any(|x| x.to_lowercase() == lower) {
            list.push(item);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_assigns_id_and_timestamps() {
        let mut c = Character::named("", "  Aria  ");
        c.gender = Gender::Unspecified;
        c.traits = vec![" brave ".into(), "".into()];
        let n = normalize_character(c, 1_000);
        assert!(n.has_id());
        assert_eq!(n.name, "Aria");
        assert_eq!(n.gender, Gender::Male);
        assert_eq!(n.traits, vec!["brave".to_string()]);
        assert_eq!(n.created_at, Some(1_000));
        assert_eq!(n.updated_at, Some(1_000));
    }

    #[test]
    fn normalize_keeps_created_at() {
        let mut c = Character::named("aria-001", "Aria");
        c.created_at = Some(5);
        let n = normalize_character(c, 9);
        assert_eq!(n.created_at, Some(5));
        assert_eq!(n.updated_at, Some(9));
        assert_eq!(n.id, "aria-001");
    }

    #[test]
    fn validate_reports_all_errors() {
        let mut c = Character::named("x", " ");
        c.age = Some(900);
        let err = validate_character(&c).unwrap_err();
        assert_eq!(err.to_string(), "name: required; age: out of range");

        c.name = "Aria".into();
        c.age = Some(500);
        assert!(validate_character(&c).is_ok());
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("dry HUMOR"), "Dry Humor");
        assert_eq!(title_case("  quick-witted"), "  Quick-witted");
    }

    #[test]
    fn add_from_comma_dedupes_case_insensitively() {
        let mut traits = vec!["Brave".to_string()];
        assert!(add_from_comma(&mut traits, "brave, curious\nloyal"));
        assert_eq!(traits, vec!["Brave", "Curious", "Loyal"]);
        assert!(!add_from_comma(&mut traits, "CURIOUS"));
    }
}
