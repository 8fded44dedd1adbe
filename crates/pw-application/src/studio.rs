//! Studio character editor.
//!
//! [`StudioEditor`] holds the record as loaded (`original`) and the working
//! copy (`draft`). Edits only touch the draft; [`StudioEditor::save`] writes
//! it through the repository and makes the stored result the new original.

use std::sync::Arc;

use pw_core::character::{
    ArchetypeSummary, Character, CharacterRepository, Gender, Readiness, Voice, VoiceArchetype,
    add_from_comma, canon_facts, compose_appearance_line, narrative_summary, validate_character,
    voice_summary,
};
use pw_core::error::Result;
use pw_core::platform::Platform;

/// Direction of a goal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Up,
    Down,
}

pub struct StudioEditor {
    repository: Arc<dyn CharacterRepository>,
    platform: Arc<dyn Platform>,
    original: Character,
    draft: Character,
    /// Voice as the last applied preset left it.
    voice_baseline: Option<Voice>,
}

impl StudioEditor {
    pub fn new(repository: Arc<dyn CharacterRepository>, platform: Arc<dyn Platform>) -> Self {
        Self {
            repository,
            platform,
            original: Character::empty(),
            draft: Character::empty(),
            voice_baseline: None,
        }
    }

    pub fn original(&self) -> &Character {
        &self.original
    }

    pub fn draft(&self) -> &Character {
        &self.draft
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.original
    }

    /// Opens a stored character; an unknown id opens a blank record.
    pub async fn load(&mut self, id: &str) -> Result<()> {
        let loaded = self.repository.get(id).await?;
        if loaded.is_none() {
            tracing::debug!("Character {} not found, opening a blank record", id);
        }
        self.reset_to(loaded.unwrap_or_else(Character::empty));
        Ok(())
    }

    /// Starts over with a blank record.
    pub fn clear(&mut self) {
        self.reset_to(Character::empty());
    }

    /// Validates and stores the draft. The stored record (with its id and
    /// timestamps) becomes both the original and the draft.
    pub async fn save(&mut self) -> Result<Character> {
        validate_character(&self.draft)?;
        let saved = self.repository.save(&self.draft).await?;
        tracing::info!("Saved character '{}' ({})", saved.name, saved.id);
        self.original = saved.clone();
        self.draft = saved.clone();
        Ok(saved)
    }

    /// Deletes a stored character; when it is the one being edited the
    /// editor starts over with a blank record.
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let removed = self.repository.delete(id).await?;
        if self.original.id == id || self.draft.id == id {
            self.clear();
        }
        Ok(removed)
    }

    /// Stored characters, sorted by name.
    pub async fn list(&self) -> Result<Vec<Character>> {
        self.repository.list().await
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_role(&mut self, role: impl Into<String>) {
        self.draft.role = role.into();
    }

    pub fn set_age(&mut self, age: Option<u32>) {
        self.draft.age = age;
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.draft.gender = gender;
    }

    pub fn set_nsfw_allowed(&mut self, allowed: bool) {
        self.draft.appearance.nsfw_allowed = allowed;
    }

    /// Free-form edit of any draft field not covered by a dedicated setter.
    pub fn edit(&mut self, f: impl FnOnce(&mut Character)) {
        f(&mut self.draft);
    }

    pub fn add_traits(&mut self, raw: &str) -> bool {
        add_from_comma(&mut self.draft.traits, raw)
    }

    pub fn add_tags(&mut self, raw: &str) -> bool {
        add_from_comma(&mut self.draft.tags, raw)
    }

    pub fn add_notable_marks(&mut self, raw: &str) -> bool {
        add_from_comma(&mut self.draft.appearance.notable_marks, raw)
    }

    pub fn remove_trait(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.draft.traits, index)
    }

    pub fn remove_tag(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.draft.tags, index)
    }

    pub fn remove_notable_mark(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.draft.appearance.notable_marks, index)
    }

    /// Appends a goal unless it is blank or already listed.
    pub fn add_goal(&mut self, text: &str) -> bool {
        let goal = text.trim();
        if goal.is_empty() || self.draft.goals.iter().any(|g| g == goal) {
            return false;
        }
        self.draft.goals.push(goal.to_string());
        true
    }

    pub fn remove_goal(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.draft.goals, index)
    }

    /// Swaps a goal with its neighbour; a move past either end is ignored.
    pub fn move_goal(&mut self, index: usize, direction: Move) -> bool {
        let target = match direction {
            Move::Up => index.checked_sub(1),
            Move::Down => index.checked_add(1),
        };
        match target {
            Some(target) if index < self.draft.goals.len() && target < self.draft.goals.len() => {
                self.draft.goals.swap(index, target);
                true
            }
            _ => false,
        }
    }

    /// Presets offered for the voice dropdown.
    pub async fn voice_archetypes(&self) -> Vec<ArchetypeSummary> {
        self.platform.get_voice_archetypes().await
    }

    /// Selects a voice preset and copies its settings into the draft.
    ///
    /// An empty id clears the selection. An id the platform does not know
    /// stays selected but copies nothing. Returns whether settings were copied.
    pub async fn apply_archetype(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() {
            self.draft.voice.archetype = VoiceArchetype::None;
            self.voice_baseline = None;
            return false;
        }

        self.draft.voice.archetype = VoiceArchetype::Preset(id.to_string());
        let Some(archetype) = self.platform.get_archetype(id).await else {
            return false;
        };
        self.draft.voice.apply_archetype(&archetype);
        self.draft.voice.archetype = VoiceArchetype::Preset(id.to_string());
        self.voice_baseline = Some(self.draft.voice.clone());
        true
    }

    /// Edits the draft voice. Once the settings differ from the applied
    /// preset the voice is marked custom; it stays custom if the edit is
    /// later undone.
    pub fn edit_voice(&mut self, f: impl FnOnce(&mut Voice)) {
        f(&mut self.draft.voice);
        let diverged = self
            .voice_baseline
            .as_ref()
            .is_some_and(|baseline| !self.draft.voice.same_settings(baseline));
        if diverged && !self.draft.voice.archetype.is_custom() {
            self.draft.voice.archetype = VoiceArchetype::Custom;
        }
    }

    /// Fills the name from the platform's name bank. Returns the new name,
    /// or `None` when the platform has no names to offer.
    pub async fn random_name(&mut self) -> Option<String> {
        let name = self.platform.get_random_name(self.draft.gender).await?;
        self.draft.name = name.clone();
        Some(name)
    }

    pub fn appearance_preview(&self) -> String {
        compose_appearance_line(&self.draft.appearance, self.draft.gender)
    }

    pub fn voice_preview(&self) -> String {
        voice_summary(&self.draft.voice)
    }

    pub fn narrative_preview(&self) -> String {
        narrative_summary(&self.draft.narrative)
    }

    pub fn canon_facts(&self) -> Vec<String> {
        canon_facts(&self.draft)
    }

    pub fn readiness(&self) -> Readiness {
        Readiness::of(&self.draft)
    }

    /// A record saved with a preset voice keeps that preset as its baseline.
    fn reset_to(&mut self, character: Character) {
        self.voice_baseline = character
            .voice
            .archetype
            .preset_id()
            .map(|_| character.voice.clone());
        self.original = character.clone();
        self.draft = character;
    }
}

fn remove_at(list: &mut Vec<String>, index: usize) -> Option<String> {
    (index < list.len()).then(|| list.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_infrastructure::FileCharacterRepository;
    use pw_interaction::LocalPlatform;
    use tempfile::TempDir;

    const VOICES: &str = r#"{"items": [
        {"id": "sage", "name": "Sage", "formality": 80, "sentenceLength": "long",
         "catchphrases": ["Patience."], "addressingStyle": "formal"}
    ]}"#;

    fn editor(dir: &TempDir) -> StudioEditor {
        let lists = dir.path().join("lists");
        std::fs::create_dir_all(&lists).unwrap();
        std::fs::write(lists.join("voice_archetypes.json"), VOICES).unwrap();
        let repository = Arc::new(FileCharacterRepository::new(dir.path().join("characters")));
        let platform = Arc::new(LocalPlatform::new(lists));
        StudioEditor::new(repository, platform)
    }

    #[tokio::test]
    async fn test_blank_editor_is_clean() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        assert!(!editor.is_dirty());
        editor.set_name("Aria");
        assert!(editor.is_dirty());
        editor.clear();
        assert!(!editor.is_dirty());
        assert_eq!(editor.readiness(), Readiness::NameRequired);
    }

    #[tokio::test]
    async fn test_save_requires_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        assert!(editor.save().await.unwrap_err().is_validation());
        assert!(editor.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        editor.set_name("Aria Farwind");
        editor.set_age(Some(27));
        editor.add_traits("brave, curious, BRAVE");

        let saved = editor.save().await.unwrap();
        assert!(saved.has_id());
        assert_eq!(saved.traits, vec!["Brave", "Curious"]);
        assert!(!editor.is_dirty());

        editor.clear();
        editor.load(&saved.id).await.unwrap();
        assert_eq!(editor.draft().name, "Aria Farwind");
        assert!(!editor.is_dirty());

        editor.load("missing").await.unwrap();
        assert_eq!(editor.draft(), &Character::empty());
    }

    #[tokio::test]
    async fn test_delete_open_record_resets_editor() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        editor.set_name("Daren");
        let saved = editor.save().await.unwrap();

        assert!(editor.delete(&saved.id).await.unwrap());
        assert_eq!(editor.draft().name, "");
        assert!(editor.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_goal_editing() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        assert!(editor.add_goal(" Find the map "));
        assert!(editor.add_goal("Repay the debt"));
        assert!(!editor.add_goal("Find the map"));
        assert!(!editor.add_goal("  "));

        assert!(editor.move_goal(1, Move::Up));
        assert_eq!(editor.draft().goals, vec!["Repay the debt", "Find the map"]);
        assert!(!editor.move_goal(0, Move::Up));
        assert!(!editor.move_goal(1, Move::Down));

        assert_eq!(editor.remove_goal(0).as_deref(), Some("Repay the debt"));
        assert_eq!(editor.remove_goal(5), None);
    }

    #[tokio::test]
    async fn test_marks_are_title_cased() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        assert!(editor.add_notable_marks("scar over left eye, freckles"));
        assert!(!editor.add_notable_marks("FRECKLES"));
        assert_eq!(
            editor.draft().appearance.notable_marks,
            vec!["Scar Over Left Eye", "Freckles"]
        );
    }

    #[tokio::test]
    async fn test_voice_edit_flips_to_custom() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);

        assert!(editor.apply_archetype("sage").await);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Preset("sage".into()));
        assert_eq!(editor.draft().voice.formality, 80);
        assert_eq!(editor.draft().voice.catchphrases, vec!["Patience."]);

        editor.edit_voice(|v| v.formality = 40);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Custom);

        editor.edit_voice(|v| v.formality = 80);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Custom);
    }

    #[tokio::test]
    async fn test_loaded_preset_voice_flips_to_custom() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        editor.set_name("Sage Keeper");
        assert!(editor.apply_archetype("sage").await);
        let saved = editor.save().await.unwrap();

        editor.clear();
        editor.load(&saved.id).await.unwrap();
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Preset("sage".into()));

        editor.edit_voice(|v| v.formality = 80);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Preset("sage".into()));
        editor.edit_voice(|v| v.formality = 20);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Custom);
    }

    #[tokio::test]
    async fn test_voice_edit_without_preset_keeps_selection() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        editor.edit_voice(|v| v.formality = 10);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::None);

        assert!(!editor.apply_archetype("unknown").await);
        assert_eq!(editor.draft().voice.archetype, VoiceArchetype::Preset("unknown".into()));
        assert_eq!(editor.draft().voice.formality, 10);

        assert!(!editor.apply_archetype("").await);
        assert!(editor.draft().voice.archetype.is_none());
    }

    #[tokio::test]
    async fn test_random_name_and_previews() {
        let temp_dir = TempDir::new().unwrap();
        let mut editor = editor(&temp_dir);
        editor.set_gender(Gender::Female);
        let name = editor.random_name().await.unwrap();
        assert_eq!(editor.draft().name, name);

        editor.set_nsfw_allowed(true);
        assert_eq!(editor.readiness(), Readiness::AdultAgeRequired);
        editor.set_age(Some(30));
        assert!(editor.readiness().is_ready());

        editor.edit(|c| c.appearance.species = "elf".into());
        assert!(editor.appearance_preview().contains("elf"));
        assert!(editor.canon_facts().iter().any(|f| f.contains("elf")));
        assert_eq!(editor.voice_archetypes().await.len(), 1);
    }
}
