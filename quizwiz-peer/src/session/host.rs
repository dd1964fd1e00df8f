//! Host Session
//!
//! The authoritative game-progression state machine. The host owns the phase,
//! the roster, every open connection and the vote tally; participants only
//! mirror what it broadcasts.
//!
//! ```text
//!   LOBBY ──start_game──▶ PLAYING ──reveal_answer──▶ REVEAL
//!     ▲                      ▲                         │
//!     │                      └──next_question (more)───┤
//!     └──────────────next_question (last)──────────────┘
//! ```
//!
//! Nothing here touches the network directly. Connection handles are opaque
//! [`PeerConnection`]s, so the same machine runs over any link.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::core::code::SessionCode;
use crate::core::id::ConnectionId;
use crate::network::link::{LinkError, PeerConnection};
use crate::network::protocol::{PeerMessage, Role};
use crate::quiz::model::{OptionColor, OptionId, Question, Quiz};
use crate::quiz::tally::{CastOutcome, VoteTally};
use crate::session::roster::{Participant, Roster};

/// Host phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// Collecting participants. Also where a finished game returns to.
    Lobby,
    /// Current question open for votes.
    Playing,
    /// Correct answer shown.
    Reveal,
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPhase::Lobby => write!(f, "LOBBY"),
            HostPhase::Playing => write!(f, "PLAYING"),
            HostPhase::Reveal => write!(f, "REVEAL"),
        }
    }
}

/// Host operation errors. A failed operation changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Operation not allowed in the current phase.
    #[error("cannot {operation} while in {phase}")]
    InvalidPhase {
        /// Operation attempted.
        operation: &'static str,
        /// Phase at the time.
        phase: HostPhase,
    },

    /// Starting needs at least one joined participant.
    #[error("no participants have joined")]
    EmptyRoster,

    /// A session needs at least one question.
    #[error("quiz has no questions")]
    EmptyQuiz,
}

/// Outcome of `next_question`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the question at this index.
    Question(usize),
    /// Questions exhausted; back in the lobby.
    Finished,
}

/// One option as shown on the projector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionStanding {
    /// Option id.
    pub id: OptionId,
    /// Option color.
    pub color: OptionColor,
    /// Answer text.
    pub text: String,
    /// Votes counted for it.
    pub votes: u32,
    /// Votes as a percentage of the live player count.
    pub share_percent: u32,
    /// True for the correct option once the answer is revealed.
    pub correct: bool,
}

/// Read-only projector view of the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// 1-based question number.
    pub number: usize,
    /// Number of questions in the quiz.
    pub total: usize,
    /// Question text.
    pub text: String,
    /// Options in color order.
    pub options: Vec<OptionStanding>,
    /// Whether the answer has been revealed.
    pub revealed: bool,
    /// Votes counted so far.
    pub total_votes: u32,
    /// Participants currently in the roster.
    pub players: usize,
}

/// The host's session.
pub struct HostSession<C> {
    code: SessionCode,
    quiz: Quiz,
    phase: HostPhase,
    question_index: usize,
    roster: Roster,
    tally: VoteTally,
    connections: BTreeMap<ConnectionId, C>,
}

impl<C: PeerConnection> HostSession<C> {
    /// Create a session in LOBBY for `quiz` under `code`.
    pub fn new(code: SessionCode, quiz: Quiz) -> Result<Self, HostError> {
        if quiz.is_empty() {
            return Err(HostError::EmptyQuiz);
        }
        Ok(Self {
            code,
            quiz,
            phase: HostPhase::Lobby,
            question_index: 0,
            roster: Roster::new(),
            tally: VoteTally::new(),
            connections: BTreeMap::new(),
        })
    }

    /// Session code.
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Quiz being played.
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Current phase.
    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    /// Index of the current question.
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    /// Current question.
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question(self.question_index)
    }

    /// Joined participants.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Votes for the current question.
    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    /// Open connections, joined or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // =========================================================================
    // LINK EVENTS
    // =========================================================================

    /// Register an inbound connection. It receives broadcasts from now on but
    /// is not a participant until it sends JOIN.
    pub fn on_connection(&mut self, id: ConnectionId, connection: C) {
        debug!("Connection {} opened", id.short());
        self.connections.insert(id, connection);
    }

    /// Handle a decoded message from `id`.
    pub fn on_message(&mut self, id: &ConnectionId, message: PeerMessage) {
        if !message.is_for(Role::Host) {
            debug!("Ignoring {} from {}", message.kind(), id.short());
            return;
        }

        match message {
            PeerMessage::Join { name } => self.handle_join(id, &name),
            PeerMessage::Vote { option_id } => self.handle_vote(id, option_id),
            other => debug!("Ignoring {} from {}", other.kind(), id.short()),
        }
    }

    /// A connection closed. The participant leaves the roster whatever the
    /// phase and any vote they cast for the current question is taken back;
    /// nobody is told.
    pub fn on_close(&mut self, id: &ConnectionId) -> Option<Participant> {
        self.connections.remove(id);
        if let Some(option) = self.tally.retract(id) {
            debug!("Retracted vote for {} from {}", option, id.short());
        }
        let left = self.roster.remove(id);
        if let Some(p) = &left {
            info!("{} left session {} ({} remaining)", p.name, self.code, self.roster.len());
        }
        left
    }

    /// A connection failed. Handled exactly like a close.
    pub fn on_error(&mut self, id: &ConnectionId, error: &LinkError) -> Option<Participant> {
        warn!("Connection {} failed: {}", id.short(), error);
        if let Some(connection) = self.connections.get(id) {
            connection.close();
        }
        self.on_close(id)
    }

    fn handle_join(&mut self, id: &ConnectionId, name: &str) {
        if !self.connections.contains_key(id) {
            debug!("JOIN from unknown connection {}", id.short());
            return;
        }
        if self.roster.insert(id.clone(), name) {
            info!(
                "{} joined session {} ({} players)",
                name.trim(),
                self.code,
                self.roster.len()
            );
        } else {
            debug!("Duplicate JOIN from {}", id.short());
        }
        self.send_to(id, &PeerMessage::Welcome { game_id: self.code.to_string() });
    }

    fn handle_vote(&mut self, id: &ConnectionId, option_id: OptionId) {
        if self.phase != HostPhase::Playing {
            debug!("Vote from {} outside PLAYING ignored", id.short());
            return;
        }
        if !self.roster.contains(id) {
            debug!("Vote from unjoined connection {} ignored", id.short());
            return;
        }
        match self.tally.cast(id, option_id) {
            CastOutcome::Counted => debug!(
                "Vote counted ({}/{})",
                self.tally.total(),
                self.roster.len()
            ),
            CastOutcome::AlreadyVoted => debug!("Repeat vote from {} ignored", id.short()),
        }
    }

    // =========================================================================
    // OPERATOR ACTIONS
    // =========================================================================

    /// LOBBY → PLAYING on the first question.
    pub fn start_game(&mut self) -> Result<(), HostError> {
        self.require(HostPhase::Lobby, "start the game")?;
        if self.roster.is_empty() {
            return Err(HostError::EmptyRoster);
        }

        self.tally.clear();
        self.question_index = 0;
        self.phase = HostPhase::Playing;
        info!("Session {} started with {} players", self.code, self.roster.len());
        self.broadcast(&PeerMessage::GameStart);
        Ok(())
    }

    /// PLAYING → REVEAL. Returns the correct option id that was broadcast.
    pub fn reveal_answer(&mut self) -> Result<OptionId, HostError> {
        self.require(HostPhase::Playing, "reveal the answer")?;
        let correct = self
            .current_question()
            .map(|q| q.correct_option_id.clone())
            .ok_or(HostError::EmptyQuiz)?;

        self.phase = HostPhase::Reveal;
        info!(
            "Question {} revealed: {} ({} votes)",
            self.question_index + 1,
            correct,
            self.tally.total()
        );
        self.broadcast(&PeerMessage::Result { correct_option_id: correct.clone() });
        Ok(correct)
    }

    /// REVEAL → PLAYING on the next question, or back to LOBBY after the last.
    pub fn next_question(&mut self) -> Result<Advance, HostError> {
        self.require(HostPhase::Reveal, "advance")?;

        self.tally.clear();
        if self.question_index + 1 < self.quiz.len() {
            self.question_index += 1;
            self.phase = HostPhase::Playing;
            info!("Question {}/{}", self.question_index + 1, self.quiz.len());
            self.broadcast(&PeerMessage::GameStart);
            Ok(Advance::Question(self.question_index))
        } else {
            self.question_index = 0;
            self.phase = HostPhase::Lobby;
            info!("Session {} finished", self.code);
            self.broadcast(&PeerMessage::GameOver);
            Ok(Advance::Finished)
        }
    }

    /// Close every connection and forget all participants.
    pub fn close(&mut self) {
        for connection in self.connections.values() {
            connection.close();
        }
        info!(
            "Session {} closed ({} connections)",
            self.code,
            self.connections.len()
        );
        self.connections.clear();
        self.roster.clear();
        self.tally.clear();
    }

    /// Projector view of the current question. `None` in the lobby.
    pub fn view(&self) -> Option<QuestionView> {
        if self.phase == HostPhase::Lobby {
            return None;
        }
        let question = self.current_question()?;
        let revealed = self.phase == HostPhase::Reveal;
        let players = self.roster.len();

        let options = question
            .options
            .iter()
            .map(|o| OptionStanding {
                id: o.id.clone(),
                color: o.color,
                text: o.text.clone(),
                votes: self.tally.count(&o.id),
                share_percent: self.tally.share_percent(&o.id, players),
                correct: revealed && o.id == question.correct_option_id,
            })
            .collect();

        Some(QuestionView {
            number: self.question_index + 1,
            total: self.quiz.len(),
            text: question.text.clone(),
            options,
            revealed,
            total_votes: self.tally.total(),
            players,
        })
    }

    fn require(&self, phase: HostPhase, operation: &'static str) -> Result<(), HostError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(HostError::InvalidPhase { operation, phase: self.phase })
        }
    }

    fn send_to(&self, id: &ConnectionId, message: &PeerMessage) {
        let Some(connection) = self.connections.get(id) else {
            return;
        };
        if let Err(e) = connection.send(message) {
            warn!("Failed to send {} to {}: {}", message.kind(), id.short(), e);
        }
    }

    /// Send to every open connection. Individual failures are logged and do
    /// not hold back the others.
    fn broadcast(&self, message: &PeerMessage) {
        let targets: Vec<C> = self.connections.values().cloned().collect();
        for connection in &targets {
            if let Err(e) = connection.send(message) {
                warn!(
                    "Broadcast {} to {} failed: {}",
                    message.kind(),
                    connection.id().short(),
                    e
                );
            }
        }
    }
}

impl<C> fmt::Debug for HostSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSession")
            .field("code", &self.code)
            .field("phase", &self.phase)
            .field("question_index", &self.question_index)
            .field("players", &self.roster.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::recording::RecordingConnection;
    use proptest::prelude::*;

    fn session() -> HostSession<RecordingConnection> {
        HostSession::new(SessionCode::parse("X9K2").unwrap(), Quiz::demo()).unwrap()
    }

    fn connect(host: &mut HostSession<RecordingConnection>, id: &str) -> RecordingConnection {
        let conn = RecordingConnection::new(id);
        host.on_connection(conn.id().clone(), conn.clone());
        conn
    }

    fn join(host: &mut HostSession<RecordingConnection>, id: &str, name: &str) -> RecordingConnection {
        let conn = connect(host, id);
        host.on_message(conn.id(), PeerMessage::Join { name: name.into() });
        conn
    }

    fn vote(host: &mut HostSession<RecordingConnection>, conn: &RecordingConnection, option: &str) {
        host.on_message(conn.id(), PeerMessage::Vote { option_id: option.into() });
    }

    #[test]
    fn test_empty_quiz_rejected() {
        let mut quiz = Quiz::demo();
        quiz.questions.clear();
        let result = HostSession::<RecordingConnection>::new(SessionCode::parse("X9K2").unwrap(), quiz);
        assert_eq!(result.err(), Some(HostError::EmptyQuiz));
    }

    #[test]
    fn test_join_adds_and_welcomes() {
        let mut host = session();
        let ann = join(&mut host, "c1", " Ann ");

        assert_eq!(host.roster().names(), vec!["Ann"]);
        assert_eq!(ann.sent(), vec![PeerMessage::Welcome { game_id: "X9K2".into() }]);
    }

    #[test]
    fn test_duplicate_join_rewelcomes_without_new_entry() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.on_message(ann.id(), PeerMessage::Join { name: "Ann again".into() });

        assert_eq!(host.roster().len(), 1);
        assert_eq!(host.roster().names(), vec!["Ann"]);
        assert_eq!(ann.sent().len(), 2);
    }

    #[test]
    fn test_join_allowed_mid_game() {
        let mut host = session();
        join(&mut host, "c1", "Ann");
        host.start_game().unwrap();
        join(&mut host, "c2", "Bob");
        assert_eq!(host.roster().len(), 2);
        assert_eq!(host.phase(), HostPhase::Playing);
    }

    #[test]
    fn test_start_requires_players() {
        let mut host = session();
        connect(&mut host, "c1");
        assert_eq!(host.start_game(), Err(HostError::EmptyRoster));
        assert_eq!(host.phase(), HostPhase::Lobby);
    }

    #[test]
    fn test_start_broadcasts_to_all_connections() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let lurker = connect(&mut host, "c2");
        ann.take_sent();

        host.start_game().unwrap();
        assert_eq!(host.phase(), HostPhase::Playing);
        assert_eq!(host.question_index(), 0);
        assert!(host.tally().is_empty());
        assert_eq!(ann.sent(), vec![PeerMessage::GameStart]);
        assert_eq!(lurker.sent(), vec![PeerMessage::GameStart]);
    }

    #[test]
    fn test_votes_counted_only_while_playing() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let bob = join(&mut host, "c2", "Bob");

        vote(&mut host, &ann, "opt1");
        assert!(host.tally().is_empty());

        host.start_game().unwrap();
        vote(&mut host, &ann, "opt2");
        vote(&mut host, &bob, "opt2");
        assert_eq!(host.tally().count(&"opt2".into()), 2);

        host.reveal_answer().unwrap();
        vote(&mut host, &ann, "opt3");
        assert_eq!(host.tally().total(), 2);
    }

    #[test]
    fn test_repeat_and_unjoined_votes_ignored() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let lurker = connect(&mut host, "c2");
        host.start_game().unwrap();

        vote(&mut host, &ann, "opt2");
        vote(&mut host, &ann, "opt4");
        vote(&mut host, &lurker, "opt1");
        assert_eq!(host.tally().total(), 1);
        assert_eq!(host.tally().count(&"opt2".into()), 1);
    }

    #[test]
    fn test_host_bound_messages_from_participants_ignored() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.on_message(ann.id(), PeerMessage::GameStart);
        host.on_message(ann.id(), PeerMessage::GameOver);
        assert_eq!(host.phase(), HostPhase::Lobby);
    }

    #[test]
    fn test_reveal_broadcasts_correct_option() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.start_game().unwrap();
        ann.take_sent();

        let correct = host.reveal_answer().unwrap();
        assert_eq!(correct, OptionId::new("opt2"));
        assert_eq!(host.phase(), HostPhase::Reveal);
        assert_eq!(ann.sent(), vec![PeerMessage::Result { correct_option_id: "opt2".into() }]);
    }

    #[test]
    fn test_wrong_phase_operations_change_nothing() {
        let mut host = session();
        join(&mut host, "c1", "Ann");

        assert!(matches!(host.reveal_answer(), Err(HostError::InvalidPhase { phase: HostPhase::Lobby, .. })));
        assert!(matches!(host.next_question(), Err(HostError::InvalidPhase { .. })));

        host.start_game().unwrap();
        assert!(matches!(host.start_game(), Err(HostError::InvalidPhase { phase: HostPhase::Playing, .. })));
        assert!(matches!(host.next_question(), Err(HostError::InvalidPhase { .. })));
        assert_eq!(host.phase(), HostPhase::Playing);
    }

    #[test]
    fn test_next_question_clears_tally() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.start_game().unwrap();
        vote(&mut host, &ann, "opt2");
        host.reveal_answer().unwrap();
        ann.take_sent();

        assert_eq!(host.next_question(), Ok(Advance::Question(1)));
        assert_eq!(host.phase(), HostPhase::Playing);
        assert!(host.tally().is_empty());
        assert_eq!(ann.sent(), vec![PeerMessage::GameStart]);

        vote(&mut host, &ann, "opt3");
        assert_eq!(host.tally().total(), 1);
    }

    #[test]
    fn test_last_question_returns_to_lobby() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.start_game().unwrap();
        for _ in 0..2 {
            host.reveal_answer().unwrap();
            host.next_question().unwrap();
        }
        host.reveal_answer().unwrap();
        ann.take_sent();

        assert_eq!(host.next_question(), Ok(Advance::Finished));
        assert_eq!(host.phase(), HostPhase::Lobby);
        assert_eq!(host.question_index(), 0);
        assert!(host.tally().is_empty());
        assert_eq!(ann.sent(), vec![PeerMessage::GameOver]);
        assert_eq!(host.roster().len(), 1);
    }

    #[test]
    fn test_close_removes_participant_silently() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let bob = join(&mut host, "c2", "Bob");
        host.start_game().unwrap();
        bob.take_sent();

        let left = host.on_close(ann.id()).unwrap();
        assert_eq!(left.name, "Ann");
        assert_eq!(host.roster().names(), vec!["Bob"]);
        assert_eq!(host.connection_count(), 1);
        assert!(bob.sent().is_empty());
        assert_eq!(host.phase(), HostPhase::Playing);
    }

    #[test]
    fn test_departed_vote_is_retracted() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let bob = join(&mut host, "c2", "Bob");
        host.start_game().unwrap();
        vote(&mut host, &ann, "opt1");
        vote(&mut host, &bob, "opt1");

        host.on_close(ann.id());
        assert_eq!(host.tally().count(&"opt1".into()), 1);

        // Ann comes back on a fresh connection and votes again.
        let ann = join(&mut host, "c3", "Ann");
        vote(&mut host, &ann, "opt1");
        assert_eq!(host.tally().total(), 2);
        assert!(host.tally().total() as usize <= host.roster().len());

        let view = host.view().unwrap();
        assert_eq!(view.total_votes, 2);
        assert_eq!(view.options[0].share_percent, 100);
    }

    #[test]
    fn test_error_treated_as_close() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        host.on_error(ann.id(), &LinkError::Transport("reset".into()));
        assert!(host.roster().is_empty());
        assert_eq!(host.connection_count(), 0);
        assert!(ann.is_closed());
    }

    #[test]
    fn test_broadcast_continues_past_failed_send() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let bob = join(&mut host, "c2", "Bob");
        ann.break_link();
        bob.take_sent();

        host.start_game().unwrap();
        assert_eq!(host.phase(), HostPhase::Playing);
        assert_eq!(bob.sent(), vec![PeerMessage::GameStart]);
    }

    #[test]
    fn test_close_shuts_every_connection() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let lurker = connect(&mut host, "c2");
        host.close();
        assert!(ann.is_closed());
        assert!(lurker.is_closed());
        assert!(host.roster().is_empty());
        assert_eq!(host.connection_count(), 0);
    }

    #[test]
    fn test_projector_view() {
        let mut host = session();
        let ann = join(&mut host, "c1", "Ann");
        let bob = join(&mut host, "c2", "Bob");
        assert!(host.view().is_none());

        host.start_game().unwrap();
        vote(&mut host, &ann, "opt2");
        vote(&mut host, &bob, "opt1");

        let view = host.view().unwrap();
        assert_eq!((view.number, view.total), (1, 3));
        assert_eq!(view.total_votes, 2);
        assert_eq!(view.players, 2);
        assert!(!view.revealed);
        assert!(view.options.iter().all(|o| !o.correct));
        assert_eq!(view.options[1].votes, 1);
        assert_eq!(view.options[1].share_percent, 50);

        host.reveal_answer().unwrap();
        let view = host.view().unwrap();
        let correct: Vec<_> = view.options.iter().filter(|o| o.correct).collect();
        assert_eq!(correct.len(), 1);
        assert_eq!(correct[0].color, OptionColor::Blue);
    }

    #[derive(Debug, Clone)]
    enum RosterOp {
        Connect(u8),
        Join(u8),
        Vote(u8, u8),
        Close(u8),
    }

    fn roster_op() -> impl Strategy<Value = RosterOp> {
        prop_oneof![
            (0u8..6).prop_map(RosterOp::Connect),
            (0u8..6).prop_map(RosterOp::Join),
            (0u8..6, 1u8..5).prop_map(|(n, opt)| RosterOp::Vote(n, opt)),
            (0u8..6).prop_map(RosterOp::Close),
        ]
    }

    proptest! {
        #[test]
        fn roster_tracks_joined_minus_closed(ops in proptest::collection::vec(roster_op(), 0..64)) {
            let mut host = session();
            let mut open = std::collections::BTreeSet::new();
            let mut joined = std::collections::BTreeSet::new();

            for op in ops {
                match op {
                    RosterOp::Connect(n) => {
                        let id = format!("c{n}");
                        if open.insert(n) {
                            connect(&mut host, &id);
                        }
                    }
                    RosterOp::Join(n) => {
                        let id = ConnectionId::new(format!("c{n}"));
                        host.on_message(&id, PeerMessage::Join { name: format!("P{n}") });
                        if open.contains(&n) {
                            joined.insert(n);
                        }
                    }
                    RosterOp::Vote(n, opt) => {
                        let id = ConnectionId::new(format!("c{n}"));
                        host.on_message(&id, PeerMessage::Vote { option_id: OptionId::new(format!("opt{opt}")) });
                    }
                    RosterOp::Close(n) => {
                        host.on_close(&ConnectionId::new(format!("c{n}")));
                        open.remove(&n);
                        joined.remove(&n);
                    }
                }
                prop_assert_eq!(host.roster().len(), joined.len());
                prop_assert!(host.roster().len() <= host.connection_count());
            }
        }

        #[test]
        fn votes_never_exceed_roster(ops in proptest::collection::vec(roster_op(), 0..64)) {
            let mut host = session();
            // One anchor player so the game can start.
            join(&mut host, "anchor", "Host pet");
            host.start_game().unwrap();

            for op in ops {
                match op {
                    RosterOp::Connect(n) => {
                        if !host.connections.contains_key(&ConnectionId::new(format!("c{n}"))) {
                            connect(&mut host, &format!("c{n}"));
                        }
                    }
                    RosterOp::Join(n) => {
                        let id = ConnectionId::new(format!("c{n}"));
                        host.on_message(&id, PeerMessage::Join { name: format!("P{n}") });
                    }
                    RosterOp::Vote(n, opt) => {
                        let id = ConnectionId::new(format!("c{n}"));
                        host.on_message(&id, PeerMessage::Vote { option_id: OptionId::new(format!("opt{opt}")) });
                    }
                    RosterOp::Close(n) => {
                        host.on_close(&ConnectionId::new(format!("c{n}")));
                    }
                }
                prop_assert!(host.tally().total() as usize <= host.roster().len());
            }
        }
    }
}
