//! Protocol Messages
//!
//! Wire format shared by host and participants. Every message is one JSON
//! text frame tagged by `"type"`; payload keys are camelCase.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quiz::model::OptionId;

/// Which end of the link a message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The session host.
    Host,
    /// A participant.
    Participant,
}

/// Every message either role can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// Participant asks to enter the roster.
    Join {
        /// Display name.
        name: String,
    },

    /// Host acknowledges a join.
    Welcome {
        /// Session code the participant joined.
        #[serde(rename = "gameId")]
        game_id: String,
    },

    /// Host opens answering for the current question.
    GameStart,

    /// Participant's answer for the current question.
    Vote {
        /// Chosen option.
        #[serde(rename = "optionId")]
        option_id: OptionId,
    },

    /// Host reveals the correct answer.
    Result {
        /// Correct option of the current question.
        #[serde(rename = "correctOptionId")]
        correct_option_id: OptionId,
    },

    /// Host ran out of questions; everyone returns to the lobby.
    GameOver,
}

impl PeerMessage {
    /// Role that sends this message.
    pub fn sender(&self) -> Role {
        match self {
            PeerMessage::Join { .. } | PeerMessage::Vote { .. } => Role::Participant,
            PeerMessage::Welcome { .. }
            | PeerMessage::GameStart
            | PeerMessage::Result { .. }
            | PeerMessage::GameOver => Role::Host,
        }
    }

    /// Whether a receiver playing `role` acts on this message.
    pub fn is_for(&self, role: Role) -> bool {
        self.sender() != role
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Join { .. } => "JOIN",
            PeerMessage::Welcome { .. } => "WELCOME",
            PeerMessage::GameStart => "GAME_START",
            PeerMessage::Vote { .. } => "VOTE",
            PeerMessage::Result { .. } => "RESULT",
            PeerMessage::GameOver => "GAME_OVER",
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Decode a received frame. Malformed frames and unknown message types
    /// are dropped rather than reported.
    pub fn decode(frame: &str) -> Option<Self> {
        match Self::from_json(frame) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("Ignoring undecodable frame ({}): {}", e, truncate(frame, 120));
                None
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
