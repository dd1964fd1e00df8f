//! Participant Session
//!
//! The participant's reactive state machine. It holds at most one connection
//! to a host and mirrors the host's broadcasts:
//!
//! ```text
//!   LOBBY ──GAME_START──▶ ANSWERING ──vote──▶ SUBMITTED ──RESULT──▶ RESULT
//!     ▲                       ▲                                       │
//!     │                       └──────────────GAME_START───────────────┤
//!     └───────────────GAME_OVER (from any phase)──────────────────────┘
//! ```
//!
//! Link status is tracked separately. Any transport failure drops the
//! connection and returns to LOBBY with the reason kept for display.

use std::fmt;

use tracing::{debug, info, warn};

use crate::core::code::{CodeError, SessionCode};
use crate::network::link::{LinkError, PeerConnection};
use crate::network::protocol::{PeerMessage, Role};
use crate::quiz::model::{OptionColor, OptionId};

/// Longest display name accepted on the join form.
pub const MAX_NAME_LEN: usize = 12;

/// Participant phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantPhase {
    /// Waiting for the host to start.
    Lobby,
    /// Choosing an answer.
    Answering,
    /// Answer sent, waiting for the reveal.
    Submitted,
    /// Correct answer known.
    Result,
}

impl fmt::Display for ParticipantPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantPhase::Lobby => write!(f, "LOBBY"),
            ParticipantPhase::Answering => write!(f, "ANSWERING"),
            ParticipantPhase::Submitted => write!(f, "SUBMITTED"),
            ParticipantPhase::Result => write!(f, "RESULT"),
        }
    }
}

/// State of the link to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not connected and not trying.
    Idle,
    /// Dialing the host.
    Connecting,
    /// JOIN sent over an open connection.
    Connected,
    /// Last attempt failed or the connection dropped.
    Failed(String),
}

/// Participant errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParticipantError {
    /// Display name is blank.
    #[error("Please enter your name.")]
    EmptyName,

    /// Display name is over the limit.
    #[error("Name must be at most {max} characters.")]
    NameTooLong {
        /// Limit.
        max: usize,
    },

    /// Session code did not parse.
    #[error("Invalid game code: {0}")]
    InvalidCode(#[from] CodeError),

    /// Already connected or connecting.
    #[error("already joined a session")]
    AlreadyJoined,

    /// No open connection.
    #[error("not connected")]
    NotConnected,

    /// Voting only happens while answering.
    #[error("cannot vote while in {0}")]
    NotAnswering(ParticipantPhase),

    /// Transport failure.
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Validated join-form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Session to join.
    pub code: SessionCode,
    /// Trimmed display name.
    pub name: String,
}

impl JoinRequest {
    /// Validate raw form input. Nothing is dialed for invalid input.
    pub fn parse(code: &str, name: &str) -> Result<Self, ParticipantError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ParticipantError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ParticipantError::NameTooLong { max: MAX_NAME_LEN });
        }
        Ok(Self {
            code: SessionCode::parse(code)?,
            name: name.to_string(),
        })
    }
}

/// The participant's session.
pub struct ParticipantSession<C> {
    request: Option<JoinRequest>,
    status: LinkStatus,
    phase: ParticipantPhase,
    game_id: Option<String>,
    selected: Option<OptionId>,
    correct: Option<OptionId>,
    connection: Option<C>,
}

impl<C> Default for ParticipantSession<C> {
    fn default() -> Self {
        Self {
            request: None,
            status: LinkStatus::Idle,
            phase: ParticipantPhase::Lobby,
            game_id: None,
            selected: None,
            correct: None,
            connection: None,
        }
    }
}

impl<C: PeerConnection> ParticipantSession<C> {
    /// Idle session in LOBBY.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link status.
    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    /// Current phase.
    pub fn phase(&self) -> ParticipantPhase {
        self.phase
    }

    /// Code confirmed by WELCOME.
    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    /// Last join request.
    pub fn request(&self) -> Option<&JoinRequest> {
        self.request.as_ref()
    }

    /// Option chosen for the current question.
    pub fn selected(&self) -> Option<&OptionId> {
        self.selected.as_ref()
    }

    /// Correct option, once revealed.
    pub fn correct(&self) -> Option<&OptionId> {
        self.correct.as_ref()
    }

    /// In RESULT, whether the selection matched the correct option.
    pub fn is_correct(&self) -> Option<bool> {
        if self.phase != ParticipantPhase::Result {
            return None;
        }
        Some(self.selected.is_some() && self.selected == self.correct)
    }

    /// Record a join attempt. Allowed when idle or after a failure.
    pub fn begin_join(&mut self, request: JoinRequest) -> Result<(), ParticipantError> {
        if matches!(self.status, LinkStatus::Connecting | LinkStatus::Connected) {
            return Err(ParticipantError::AlreadyJoined);
        }
        info!("Joining {} as {}", request.code, request.name);
        self.request = Some(request);
        self.status = LinkStatus::Connecting;
        self.game_id = None;
        self.reset_round();
        Ok(())
    }

    /// The connection opened: send JOIN.
    pub fn on_open(&mut self, connection: C) {
        let Some(request) = &self.request else {
            warn!("Connection opened without a join request");
            connection.close();
            return;
        };

        let join = PeerMessage::Join { name: request.name.clone() };
        if let Err(e) = connection.send(&join) {
            connection.close();
            self.fail(&e);
            return;
        }
        self.connection = Some(connection);
        self.status = LinkStatus::Connected;
        self.phase = ParticipantPhase::Lobby;
    }

    /// Handle a decoded message from the host.
    pub fn on_message(&mut self, message: PeerMessage) {
        if !message.is_for(Role::Participant) {
            debug!("Ignoring {} from host", message.kind());
            return;
        }

        match message {
            PeerMessage::Welcome { game_id } => {
                info!("Joined game {}", game_id);
                self.game_id = Some(game_id);
            }
            PeerMessage::GameStart => {
                self.reset_round();
                self.phase = ParticipantPhase::Answering;
            }
            PeerMessage::Result { correct_option_id } => {
                if self.phase != ParticipantPhase::Submitted {
                    debug!("RESULT while {} ignored", self.phase);
                    return;
                }
                self.correct = Some(correct_option_id);
                self.phase = ParticipantPhase::Result;
            }
            PeerMessage::GameOver => {
                self.reset_round();
                self.phase = ParticipantPhase::Lobby;
            }
            other => debug!("Ignoring {} from host", other.kind()),
        }
    }

    /// Answer the current question.
    pub fn vote(&mut self, color: OptionColor) -> Result<OptionId, ParticipantError> {
        if self.phase != ParticipantPhase::Answering {
            return Err(ParticipantError::NotAnswering(self.phase));
        }
        let connection = self.connection.as_ref().ok_or(ParticipantError::NotConnected)?;

        let option_id = color.option_id();
        if let Err(e) = connection.send(&PeerMessage::Vote { option_id: option_id.clone() }) {
            self.fail(&e);
            return Err(e.into());
        }
        self.selected = Some(option_id.clone());
        self.phase = ParticipantPhase::Submitted;
        Ok(option_id)
    }

    /// Dialing the host failed.
    pub fn on_connect_failed(&mut self, error: &LinkError) {
        self.fail(error);
    }

    /// The host closed the connection.
    pub fn on_close(&mut self) {
        self.fail(&LinkError::Closed);
    }

    /// The connection failed.
    pub fn on_error(&mut self, error: &LinkError) {
        self.fail(error);
    }

    /// Close the connection and go idle.
    pub fn leave(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.status = LinkStatus::Idle;
        self.phase = ParticipantPhase::Lobby;
        self.game_id = None;
        self.reset_round();
    }

    fn fail(&mut self, error: &LinkError) {
        warn!("Link to host lost: {}", error);
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.status = LinkStatus::Failed(error.to_string());
        self.phase = ParticipantPhase::Lobby;
        self.reset_round();
    }

    fn reset_round(&mut self) {
        self.selected = None;
        self.correct = None;
    }
}

impl<C> fmt::Debug for ParticipantSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantSession")
            .field("status", &self.status)
            .field("phase", &self.phase)
            .field("game_id", &self.game_id)
            .field("selected", &self.selected)
            .field("correct", &self.correct)
            .finish()
    }
}
