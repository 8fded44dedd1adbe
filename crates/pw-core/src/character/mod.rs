//! Character domain module.
//!
//! # Module Structure
//!
//! - `model`: the `Character` record and its nested blocks
//! - `voice`: voice settings, archetype presets and the `VoiceArchetype` tag
//! - `summary`: preview text derived from a character
//! - `validation`: save-time normalization, validation and list helpers
//! - `repository`: repository trait for character persistence

mod model;
mod repository;
mod summary;
mod validation;
mod voice;

pub use model::{
    Appearance, CHARACTER_VERSION, Character, Gender, Narrative, Relationship, StoryBeats,
    now_millis,
};
pub use repository::CharacterRepository;
pub use summary::{
    APPEARANCE_LINE_MAX, Readiness, canon_facts, compose_appearance_line, narrative_summary,
    voice_summary,
};
pub use validation::{
    MAX_AGE, add_from_comma, clean_list, comma_split, normalize_character, title_case,
    validate_character,
};
pub use voice::{Archetype, ArchetypeSummary, CUSTOM_ARCHETYPE, Voice, VoiceArchetype};
