use rand::Rng;

use super::message::Message;
use super::model::{Session, SessionDescriptor, SessionKind};
use crate::character::now_millis;
use crate::error::{PwError, Result};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 8;

/// Owns the Stage's session list and the current-session pointer.
///
/// Sessions are kept most-recently-created first. `current_session_id` is
/// always `None` or the id of a session in the list; every mutation goes
/// through this type so the invariant holds.
#[derive(Debug, Default, Clone)]
pub struct SessionManager {
    sessions: Vec<Session>,
    current_session_id: Option<String>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty direct session at the front of the list.
    ///
    /// No de-duplication: use [`find_session_by_character`](Self::find_session_by_character)
    /// first when one session per character is wanted.
    pub fn create_session(&mut self, character_id: &str) -> String {
        let id = self.fresh_id("s_");
        self.sessions.insert(
            0,
            Session {
                id: id.clone(),
                kind: SessionKind::Direct {
                    character_id: character_id.to_string(),
                },
                started_at: now_millis(),
                messages: Vec::new(),
            },
        );
        tracing::debug!("Created session {} for character {}", id, character_id);
        id
    }

    /// First direct session (in list order) for the character.
    pub fn find_session_by_character(&self, character_id: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.character_id() == Some(character_id))
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current_session_id.as_deref()?;
        self.get_session_by_id(id)
    }

    pub fn current_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.current_session_id.clone()?;
        self.get_session_mut(&id)
    }

    pub fn get_session_by_id(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Makes `id` current when it resolves and describes the current session.
    ///
    /// An unknown id leaves the current pointer untouched and yields an empty
    /// descriptor.
    pub fn switch_to_session(&mut self, id: &str) -> SessionDescriptor {
        match self.get_session_by_id(id) {
            Some(session) => {
                let descriptor = SessionDescriptor::from(Some(session));
                self.current_session_id = Some(id.to_string());
                descriptor
            }
            None => {
                tracing::debug!("switch_to_session: unknown session {}", id);
                SessionDescriptor::default()
            }
        }
    }

    /// Removes a session. When it was current, the new front becomes current.
    pub fn close_session(&mut self, id: &str) -> Option<&str> {
        if let Some(idx) = self.sessions.iter().position(|s| s.id == id) {
            self.sessions.remove(idx);
            if self.current_session_id.as_deref() == Some(id) {
                self.current_session_id = self.sessions.first().map(|s| s.id.clone());
            }
        }
        self.current_session_id()
    }

    /// Creates a seeded group session at the front and switches to it.
    ///
    /// `participant_names` are the display names of `character_ids` in the
    /// same order; names that did not resolve may be left out.
    pub fn start_group_session(
        &mut self,
        character_ids: &[String],
        participant_names: &[String],
    ) -> Result<String> {
        let mut distinct: Vec<&String> = Vec::new();
        for id in character_ids {
            if !distinct.contains(&id) {
                distinct.push(id);
            }
        }
        if distinct.len() < 2 {
            return Err(PwError::validation("Pick at least two characters."));
        }

        let id = self.fresh_id("g_");
        let mut messages = vec![Message::user("(group) Session started.")];
        if let Some(name) = participant_names.first().filter(|n| !n.is_empty()) {
            messages.push(Message::assistant(format!("[{name}] Checking in.")));
        }
        if let Some(name) = participant_names.get(1).filter(|n| !n.is_empty()) {
            messages.push(Message::assistant(format!("[{name}] Ready to coordinate.")));
        }

        self.sessions.insert(
            0,
            Session {
                id: id.clone(),
                kind: SessionKind::Group {
                    participant_ids: character_ids.to_vec(),
                },
                started_at: now_millis(),
                messages,
            },
        );
        self.switch_to_session(&id);
        tracing::debug!("Started group session {} with {} participants", id, character_ids.len());
        Ok(id)
    }

    /// Appends to a session's transcript. Returns `false` if the session is gone.
    pub fn append_message(&mut self, session_id: &str, message: Message) -> bool {
        match self.get_session_mut(session_id) {
            Some(session) => {
                session.push(message);
                true
            }
            None => false,
        }
    }

    /// Empties a session's transcript. Returns `false` if the session is gone.
    pub fn clear_messages(&mut self, session_id: &str) -> bool {
        match self.get_session_mut(session_id) {
            Some(session) => {
                session.messages.clear();
                true
            }
            None => false,
        }
    }

    /// Drops every session.
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.current_session_id = None;
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let suffix: String = (0..ID_SUFFIX_LEN)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            let id = format!("{prefix}{suffix}");
            if self.get_session_by_id(&id).is_none() {
                return id;
            }
        }
    }
}
