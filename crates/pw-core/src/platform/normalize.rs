//! Normalizers shared by every platform provider.
//!
//! Providers hand over loosely shaped JSON (arrays, `{list}` objects,
//! newline-separated strings); these functions turn it into the typed
//! records the rest of the workspace uses.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::character::{Archetype, ArchetypeSummary};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));
static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\r?\n)+").expect("valid line regex"));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*#.*$").expect("valid comment regex"));

/// Lower-case, non-alphanumeric runs collapsed to `-`, no leading or trailing `-`.
pub fn slug(raw: &str) -> String {
    NON_ALNUM
        .replace_all(&raw.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Source syntax of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListDialect {
    /// Entries are taken verbatim.
    #[default]
    Plain,
    /// Perchance list syntax: `# comments` and `|weight` suffixes are stripped.
    Perchance,
}

/// Normalizes a list: trims, drops blanks and de-duplicates case-insensitively,
/// keeping the first spelling.
///
/// Accepts an array, a `{list: [...]}` object (plain dialect) or a
/// newline-separated string. Object entries contribute their `value`,
/// `label` or `name`.
pub fn normalize_list(raw: &Value, dialect: ListDialect) -> Vec<String> {
    let items: Vec<Value> = match raw {
        Value::Array(items) => items.clone(),
        Value::Object(map) if dialect == ListDialect::Plain => match map.get("list") {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => split_lines(&scalar_string(other)),
            None => Vec::new(),
        },
        Value::Null => Vec::new(),
        other => split_lines(&scalar_string(other)),
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let text = match &item {
            Value::Object(map) => ["value", "label", "name"]
                .iter()
                .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
                .map(scalar_string)
                .unwrap_or_default(),
            other => scalar_string(other),
        };
        let mut entry = text.trim().to_string();
        if dialect == ListDialect::Perchance {
            entry = COMMENT.replace(&entry, "").to_string();
            entry = entry.split('|').next().unwrap_or_default().trim().to_string();
        }
        if entry.is_empty() || !seen.insert(entry.to_lowercase()) {
            continue;
        }
        out.push(entry);
    }
    out
}

/// Fills in every archetype field with its default.
///
/// Defaults: formality 0, sentence length `medium`, vocabulary `simple`,
/// disfluency `off`, addressing `direct`, repetition guard 1/6/3. Weights
/// are truncated to the number of emotion names.
pub fn normalize_archetype(raw: &Value, fallback_name: &str) -> Archetype {
    let get = |key: &str| raw.get(key).filter(|v| !v.is_null());
    let text_or = |key: &str, default: &str| -> String {
        get(key)
            .map(scalar_string)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    let count_or = |key: &str, default: u32| -> u32 {
        get(key).and_then(to_number).map(|n| n.max(0.0) as u32).unwrap_or(default)
    };

    let names = clean_strings(get("emotionNames"));
    let mut weights: Vec<f64> = to_array(get("emotionWeights"))
        .iter()
        .filter_map(to_number)
        .collect();
    weights.truncate(names.len());

    let id = get("id").map(scalar_string).filter(|s| !s.is_empty()).unwrap_or_else(|| slug(fallback_name));
    let name = get("name")
        .map(scalar_string)
        .filter(|s| !s.is_empty())
        .or_else(|| Some(fallback_name.to_string()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| id.clone());
    let addressing = get("addressingStyle")
        .or_else(|| get("addressing"))
        .map(scalar_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "direct".to_string());

    Archetype {
        id,
        name,
        formality: get("formality").and_then(to_number).map(|n| n.round() as i32).unwrap_or(0),
        sentence_length: text_or("sentenceLength", "medium"),
        vocabulary: text_or("vocabulary", "simple"),
        disfluency: text_or("disfluency", "off"),
        emotion_names: names,
        emotion_weights: weights,
        catchphrases: clean_strings(get("catchphrases")),
        avoid_list: clean_strings(get("avoidList")),
        addressing_style: addressing,
        repguard_burst: count_or("repguardBurst", 1),
        repguard_decay: count_or("repguardDecay", 6),
        repguard_cooling: count_or("repguardCooling", 3),
    }
}

/// Archetypes keyed by id, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceDoc {
    order: Vec<String>,
    by_id: HashMap<String, Archetype>,
}

impl VoiceDoc {
    fn upsert(&mut self, raw: &Value) {
        let id = raw.get("id").map(scalar_string).unwrap_or_default().trim().to_string();
        let name = raw
            .get("name")
            .filter(|v| !v.is_null())
            .map(scalar_string)
            .unwrap_or_else(|| id.clone())
            .trim()
            .to_string();
        if id.is_empty() || name.is_empty() {
            return;
        }
        let mut archetype = normalize_archetype(raw, &name);
        archetype.id = id.clone();
        if !self.by_id.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.by_id.insert(id, archetype);
    }

    /// Dropdown entries in first-seen order.
    pub fn list(&self) -> Vec<ArchetypeSummary> {
        self.items()
            .map(|a| ArchetypeSummary {
                id: a.id.clone(),
                name: if a.name.is_empty() { a.id.clone() } else { a.name.clone() },
            })
            .collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &Archetype> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Archetype> {
        self.by_id.get(id.trim())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Builds the archetype document from a voice archetypes file.
///
/// Accepts an array of archetype objects, or an object with `items` (map or
/// array of archetypes) and/or `list` (names; minimal entries are created
/// for names not already present). First occurrence of an id fixes its
/// position, the last occurrence supplies its data.
pub fn build_voice_doc(raw: &Value) -> VoiceDoc {
    let mut doc = VoiceDoc::default();
    match raw {
        Value::Array(items) => items.iter().for_each(|o| doc.upsert(o)),
        Value::Object(map) => {
            match map.get("items") {
                Some(Value::Object(items)) => items.values().for_each(|o| doc.upsert(o)),
                Some(Value::Array(items)) => items.iter().for_each(|o| doc.upsert(o)),
                _ => {}
            }
            if let Some(Value::Array(names)) = map.get("list") {
                for name in names {
                    let name = scalar_string(name).trim().to_string();
                    if name.is_empty() {
                        continue;
                    }
                    let id = slug(&name);
                    if !doc.by_id.contains_key(&id) {
                        doc.upsert(&json!({ "id": id, "name": name }));
                    }
                }
            }
        }
        _ => {}
    }
    doc
}

/// First `max` characters of `text`.
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn split_lines(text: &str) -> Vec<Value> {
    LINE_BREAKS
        .split(text)
        .map(|s| Value::String(s.to_string()))
        .collect()
}

fn to_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => split_lines(&scalar_string(other)),
    }
}

fn clean_strings(value: Option<&Value>) -> Vec<String> {
    to_array(value)
        .iter()
        .map(|v| scalar_string(v).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}
