//! Voice settings and archetype presets.
//!
//! A voice starts from nothing, from a named preset, or is hand-tuned.
//! [`VoiceArchetype`] keeps that distinction explicit; on the wire it is a
//! single string (`""`, the preset id, or `"custom"`).

use serde::{Deserialize, Serialize};

/// Wire value for a hand-tuned voice.
pub const CUSTOM_ARCHETYPE: &str = "custom";

/// Where the current voice settings came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VoiceArchetype {
    /// No archetype chosen.
    #[default]
    None,
    /// Fields were copied from the named preset and not edited since.
    Preset(String),
    /// Fields were edited by hand (possibly after a preset was applied).
    Custom,
}

impl VoiceArchetype {
    pub fn is_none(&self) -> bool {
        matches!(self, VoiceArchetype::None)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, VoiceArchetype::Custom)
    }

    /// Preset id, if the voice is still preset-derived.
    pub fn preset_id(&self) -> Option<&str> {
        match self {
            VoiceArchetype::Preset(id) => Some(id),
            _ => None,
        }
    }

    /// Label shown in prompts and summaries; `None` when unset.
    pub fn label(&self) -> Option<&str> {
        match self {
            VoiceArchetype::None => None,
            VoiceArchetype::Preset(id) => Some(id),
            VoiceArchetype::Custom => Some(CUSTOM_ARCHETYPE),
        }
    }
}

impl From<String> for VoiceArchetype {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            VoiceArchetype::None
        } else if trimmed == CUSTOM_ARCHETYPE {
            VoiceArchetype::Custom
        } else {
            VoiceArchetype::Preset(trimmed.to_string())
        }
    }
}

impl From<&str> for VoiceArchetype {
    fn from(raw: &str) -> Self {
        VoiceArchetype::from(raw.to_string())
    }
}

impl From<VoiceArchetype> for String {
    fn from(archetype: VoiceArchetype) -> Self {
        archetype.label().unwrap_or_default().to_string()
    }
}

/// A provider-normalized voice archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archetype {
    pub id: String,
    pub name: String,
    pub formality: i32,
    pub sentence_length: String,
    pub vocabulary: String,
    pub disfluency: String,
    pub emotion_names: Vec<String>,
    pub emotion_weights: Vec<f64>,
    pub catchphrases: Vec<String>,
    pub avoid_list: Vec<String>,
    pub addressing_style: String,
    pub repguard_burst: u32,
    pub repguard_decay: u32,
    pub repguard_cooling: u32,
}

/// Dropdown entry for an archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeSummary {
    pub id: String,
    pub name: String,
}

/// Speech settings of a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Voice {
    pub archetype: VoiceArchetype,
    pub formality: i32,
    pub sentence_length: String,
    pub vocabulary: String,
    pub disfluency: String,
    pub emotion_names: Vec<String>,
    pub emotion_weights: Vec<f64>,
    pub catchphrases: Vec<String>,
    #[serde(alias = "avoid")]
    pub avoid_list: Vec<String>,
    #[serde(alias = "addressing")]
    pub addressing_style: String,
    pub repguard_burst: u32,
    pub repguard_decay: u32,
    pub repguard_cooling: u32,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            archetype: VoiceArchetype::None,
            formality: 0,
            sentence_length: String::new(),
            vocabulary: String::new(),
            disfluency: "none".to_string(),
            emotion_names: Vec::new(),
            emotion_weights: Vec::new(),
            catchphrases: Vec::new(),
            avoid_list: Vec::new(),
            addressing_style: "neutral".to_string(),
            repguard_burst: 2,
            repguard_decay: 3,
            repguard_cooling: 2,
        }
    }
}

impl Voice {
    /// Copies every preset field and marks the voice as preset-derived.
    pub fn apply_archetype(&mut self, archetype: &Archetype) {
        self.archetype = VoiceArchetype::Preset(archetype.id.clone());
        self.formality = archetype.formality;
        self.sentence_length = archetype.sentence_length.clone();
        self.vocabulary = archetype.vocabulary.clone();
        self.disfluency = archetype.disfluency.clone();
        self.emotion_names = archetype.emotion_names.clone();
        self.emotion_weights = archetype.emotion_weights.clone();
        self.catchphrases = archetype.catchphrases.clone();
        self.avoid_list = archetype.avoid_list.clone();
        self.addressing_style = archetype.addressing_style.clone();
        self.repguard_burst = archetype.repguard_burst;
        self.repguard_decay = archetype.repguard_decay;
        self.repguard_cooling = archetype.repguard_cooling;
    }

    /// Compares every tunable field, ignoring where the voice came from.
    pub fn same_settings(&self, other: &Voice) -> bool {
        self.formality == other.formality
            && self.sentence_length == other.sentence_length
            && self.vocabulary == other.vocabulary
            && self.disfluency == other.disfluency
            && self.emotion_names == other.emotion_names
            && self.emotion_weights == other.emotion_weights
            && self.catchphrases == other.catchphrases
            && self.avoid_list == other.avoid_list
            && self.addressing_style == other.addressing_style
            && self.repguard_burst == other.repguard_burst
            && self.repguard_decay == other.repguard_decay
            && self.repguard_cooling == other.repguard_cooling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sage() -> Archetype {
        Archetype {
            id: "sage".into(),
            name: "Sage".into(),
            formality: 70,
            sentence_length: "long".into(),
            vocabulary: "rich".into(),
            disfluency: "off".into(),
            emotion_names: vec!["calm".into()],
            emotion_weights: vec![0.8],
            catchphrases: vec!["Patience.".into()],
            avoid_list: vec!["slang".into()],
            addressing_style: "formal".into(),
            repguard_burst: 1,
            repguard_decay: 6,
            repguard_cooling: 3,
        }
    }

    #[test]
    fn archetype_wire_strings() {
        assert_eq!(VoiceArchetype::from(""), VoiceArchetype::None);
        assert_eq!(VoiceArchetype::from("custom"), VoiceArchetype::Custom);
        assert_eq!(
            VoiceArchetype::from("sage"),
            VoiceArchetype::Preset("sage".into())
        );
        let json = serde_json::to_string(&VoiceArchetype::Custom).unwrap();
        assert_eq!(json, "\"custom\"");
    }

    #[test]
    fn apply_archetype_copies_fields() {
        let mut voice = Voice::default();
        voice.apply_archetype(&sage());
        assert_eq!(voice.archetype.preset_id(), Some("sage"));
        assert_eq!(voice.formality, 70);
        assert_eq!(voice.addressing_style, "formal");
    }

    #[test]
    fn same_settings_ignores_archetype_tag() {
        let mut a = Voice::default();
        a.apply_archetype(&sage());
        let mut b = a.clone();
        b.archetype = VoiceArchetype::Custom;
        assert!(a.same_settings(&b));
        b.formality = 10;
        assert!(!a.same_settings(&b));
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let voice: Voice =
            serde_json::from_str(r#"{"archetype":"sage","avoid":["x"],"addressing":"casual"}"#)
                .unwrap();
        assert_eq!(voice.avoid_list, vec!["x".to_string()]);
        assert_eq!(voice.addressing_style, "casual");
    }
}
