//! Chat session model.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Who a session talks to.
///
/// A session is either a 1:1 chat with one character or a group chat over an
/// ordered list of participants, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SessionKind {
    Direct {
        #[serde(rename = "characterId")]
        character_id: String,
    },
    Group {
        #[serde(rename = "participantIds")]
        participant_ids: Vec<String>,
    },
}

/// A chat session shown as a tab on the Stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// `s_` prefix for direct chats, `g_` for group chats.
    pub id: String,
    #[serde(flatten)]
    pub kind: SessionKind,
    /// Epoch milliseconds.
    pub started_at: i64,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, SessionKind::Group { .. })
    }

    /// Character id of a direct session.
    pub fn character_id(&self) -> Option<&str> {
        match &self.kind {
            SessionKind::Direct { character_id } => Some(character_id),
            SessionKind::Group { .. } => None,
        }
    }

    /// Participant ids of a group session (empty for direct sessions).
    pub fn participant_ids(&self) -> &[String] {
        match &self.kind {
            SessionKind::Direct { .. } => &[],
            SessionKind::Group { participant_ids } => participant_ids,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// What the caller needs to render the header after a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub is_group: bool,
    pub character_id: Option<String>,
}

impl From<Option<&Session>> for SessionDescriptor {
    fn from(session: Option<&Session>) -> Self {
        match session {
            Some(s) => Self {
                is_group: s.is_group(),
                character_id: s.character_id().map(str::to_string),
            },
            None => Self::default(),
        }
    }
}
