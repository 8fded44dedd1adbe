//! Stage state.
//!
//! Holds everything one running Stage session works on: the imported
//! characters, the chat sessions, the selection and the loaded bundle's
//! metadata.

use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::session::{Session, SessionManager};

/// Metadata of the currently loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    pub exported_at: String,
    pub filename: String,
    pub count: usize,
}

impl BundleMeta {
    /// `"<count> chars - <filename>"`
    pub fn label(&self) -> String {
        format!("{} chars - {}", self.count, self.filename)
    }
}

/// Mutable state of a Stage instance.
///
/// A passive container: sessions and the current-session pointer live in
/// [`SessionManager`], which is the only writer of either.
#[derive(Debug, Default, Clone)]
pub struct StageState {
    pub characters: Vec<Character>,
    pub sessions: SessionManager,
    pub selected_char_id: Option<String>,
    selected: Vec<String>,
    pub bundle_meta: Option<BundleMeta>,
    /// Text of the last prompt preview shown to the user.
    pub last_prompt_preview: String,
}

impl StageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (`on = true`) or removes a character from the bulk selection.
    pub fn set_selected(&mut self, id: &str, on: bool) {
        if on {
            if !self.selected.iter().any(|s| s == id) {
                self.selected.push(id.to_string());
            }
        } else {
            self.selected.retain(|s| s != id);
        }
    }

    /// Selected ids in the order they were checked.
    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn select_character(&mut self, id: &str) {
        self.selected_char_id = Some(id.to_string());
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Characters whose name, role, species or tags contain `query`,
    /// case-insensitively. An empty query matches everything.
    pub fn search_characters(&self, query: &str) -> Vec<&Character> {
        let needle = query.to_lowercase();
        self.characters
            .iter()
            .filter(|c| {
                let haystack = format!(
                    "{} {} {} {}",
                    c.name,
                    c.role,
                    c.appearance.species,
                    c.tags.join(" ")
                )
                .to_lowercase();
                haystack.contains(&needle)
            })
            .collect()
    }

    /// Display names of a session's participants; unknown ids are shown as-is.
    pub fn participant_names(&self, session: &Session) -> Vec<String> {
        self.names_of(session.participant_ids())
    }

    /// Display names for character ids; unknown ids are shown as-is.
    pub fn names_of(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.character(id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }

    /// Tab label: the character's name, `?` when it is gone, `Group` for groups.
    pub fn tab_label(&self, session: &Session) -> String {
        match session.character_id() {
            Some(id) => self
                .character(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "?".to_string()),
            None => "Group".to_string(),
        }
    }

    /// Group header subtitle: first two names, then `+N`.
    pub fn group_label(&self, session: &Session) -> String {
        let names = self.participant_names(session);
        let mut label = names.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
        if names.len() > 2 {
            label.push_str(&format!(" +{}", names.len() - 2));
        }
        if label.is_empty() { "-".to_string() } else { label }
    }
}
