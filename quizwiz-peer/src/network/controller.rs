//! Session Controllers
//!
//! Each controller is one tokio task that owns its state machine and selects
//! over link events and commands. Nothing else touches the session, so the
//! state needs no locks. Callers talk to the task through a cheap handle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, instrument};

use crate::core::code::SessionCode;
use crate::network::link::{
    ConnectionEvent, Dialed, HostEvent, LinkError, Listener, PeerConnection, PeerLink,
};
use crate::quiz::model::{OptionColor, OptionId, Quiz};
use crate::session::host::{Advance, HostError, HostPhase, HostSession, QuestionView};
use crate::session::participant::{
    JoinRequest, LinkStatus, ParticipantError, ParticipantPhase, ParticipantSession,
};

const COMMAND_CAPACITY: usize = 16;

/// Errors surfaced through controller handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Transport failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Host operation rejected.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Participant operation rejected.
    #[error(transparent)]
    Participant(#[from] ParticipantError),

    /// The controller task has ended.
    #[error("controller stopped")]
    Stopped,
}

// =============================================================================
// HOST
// =============================================================================

/// Snapshot of the host session for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    /// Session code.
    pub code: SessionCode,
    /// Current phase.
    pub phase: HostPhase,
    /// Current question index.
    pub question_index: usize,
    /// Questions in the quiz.
    pub question_count: usize,
    /// Participant names in join order.
    pub players: Vec<String>,
    /// Open connections, joined or not.
    pub connections: usize,
    /// Projector view, outside the lobby.
    pub view: Option<QuestionView>,
}

enum HostCommand {
    Start(oneshot::Sender<Result<(), HostError>>),
    Reveal(oneshot::Sender<Result<OptionId, HostError>>),
    Next(oneshot::Sender<Result<Advance, HostError>>),
    Status(oneshot::Sender<HostStatus>),
    Shutdown,
}

/// Drives a [`HostSession`] from a listener.
pub struct HostController<C> {
    session: HostSession<C>,
    listener: Listener<C>,
    commands: mpsc::Receiver<HostCommand>,
}

impl<C: PeerConnection> HostController<C> {
    /// Open `code` on `link` and start hosting `quiz`.
    #[instrument(skip_all, fields(code = %code))]
    pub async fn spawn<L>(link: &L, code: SessionCode, quiz: Quiz) -> Result<HostHandle, ControllerError>
    where
        L: PeerLink<Connection = C>,
    {
        let session = HostSession::new(code.clone(), quiz)?;
        let listener = link.open(&code).await?;
        let local_addr = listener.local_addr;

        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let controller = Self {
            session,
            listener,
            commands: rx,
        };
        let task = tokio::spawn(controller.run());

        Ok(HostHandle {
            code,
            local_addr,
            commands: tx,
            task,
        })
    }

    async fn run(mut self) {
        info!(
            "Hosting '{}' as {}",
            self.session.quiz().title,
            self.session.code()
        );

        loop {
            tokio::select! {
                Some(event) = self.listener.events.recv() => self.on_event(event),
                command = self.commands.recv() => match command {
                    Some(HostCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
        }

        self.session.close();
        info!("Host controller for {} stopped", self.session.code());
    }

    fn on_event(&mut self, event: HostEvent<C>) {
        match event {
            HostEvent::Connected { id, connection } => self.session.on_connection(id, connection),
            HostEvent::Data { id, message } => self.session.on_message(&id, message),
            HostEvent::Closed { id } => {
                self.session.on_close(&id);
            }
            HostEvent::Error { id, error } => {
                self.session.on_error(&id, &error);
            }
        }
    }

    fn on_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Start(reply) => {
                let _ = reply.send(self.session.start_game());
            }
            HostCommand::Reveal(reply) => {
                let _ = reply.send(self.session.reveal_answer());
            }
            HostCommand::Next(reply) => {
                let _ = reply.send(self.session.next_question());
            }
            HostCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            HostCommand::Shutdown => {}
        }
    }

    fn status(&self) -> HostStatus {
        HostStatus {
            code: self.session.code().clone(),
            phase: self.session.phase(),
            question_index: self.session.question_index(),
            question_count: self.session.quiz().len(),
            players: self.session.roster().names(),
            connections: self.session.connection_count(),
            view: self.session.view(),
        }
    }
}

/// Handle to a running host controller.
pub struct HostHandle {
    code: SessionCode,
    local_addr: Option<SocketAddr>,
    commands: mpsc::Sender<HostCommand>,
    task: JoinHandle<()>,
}

impl HostHandle {
    /// Session code participants join with.
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Bound socket address, for socket-based links.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// LOBBY → PLAYING.
    pub async fn start_game(&self) -> Result<(), ControllerError> {
        Ok(self.request(HostCommand::Start).await??)
    }

    /// PLAYING → REVEAL.
    pub async fn reveal_answer(&self) -> Result<OptionId, ControllerError> {
        Ok(self.request(HostCommand::Reveal).await??)
    }

    /// REVEAL → next question or LOBBY.
    pub async fn next_question(&self) -> Result<Advance, ControllerError> {
        Ok(self.request(HostCommand::Next).await??)
    }

    /// Current session snapshot.
    pub async fn status(&self) -> Result<HostStatus, ControllerError> {
        self.request(HostCommand::Status).await
    }

    /// Close every connection and stop the controller.
    pub async fn shutdown(self) {
        let _ = self.commands.send(HostCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> Result<T, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ControllerError::Stopped)?;
        rx.await.map_err(|_| ControllerError::Stopped)
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Snapshot of the participant session, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSnapshot {
    /// Link status.
    pub status: LinkStatus,
    /// Current phase.
    pub phase: ParticipantPhase,
    /// Code confirmed by the host.
    pub game_id: Option<String>,
    /// Selected option.
    pub selected: Option<OptionId>,
    /// Revealed correct option.
    pub correct: Option<OptionId>,
    /// Correctness, in RESULT.
    pub is_correct: Option<bool>,
}

impl<C: PeerConnection> From<&ParticipantSession<C>> for ParticipantSnapshot {
    fn from(session: &ParticipantSession<C>) -> Self {
        Self {
            status: session.status().clone(),
            phase: session.phase(),
            game_id: session.game_id().map(str::to_string),
            selected: session.selected().cloned(),
            correct: session.correct().cloned(),
            is_correct: session.is_correct(),
        }
    }
}

enum ParticipantCommand {
    Join(JoinRequest, oneshot::Sender<Result<(), ParticipantError>>),
    Vote(OptionColor, oneshot::Sender<Result<OptionId, ParticipantError>>),
    Leave(oneshot::Sender<()>),
    Shutdown,
}

/// A connect attempt running beside the event loop.
struct Dial<C> {
    task: JoinHandle<Result<Dialed<C>, LinkError>>,
    reply: oneshot::Sender<Result<(), ParticipantError>>,
}

/// Drives a [`ParticipantSession`] over a link.
pub struct ParticipantController<L: PeerLink> {
    link: Arc<L>,
    session: ParticipantSession<L::Connection>,
    dial: Option<Dial<L::Connection>>,
    pending: Option<L::Connection>,
    events: Option<mpsc::Receiver<ConnectionEvent>>,
    commands: mpsc::Receiver<ParticipantCommand>,
    state: watch::Sender<ParticipantSnapshot>,
}

impl<L: PeerLink + 'static> ParticipantController<L> {
    /// Start an idle participant on `link`.
    pub fn spawn(link: L) -> ParticipantHandle {
        let session = ParticipantSession::new();
        let (state_tx, state_rx) = watch::channel(ParticipantSnapshot::from(&session));
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

        let controller = Self {
            link: Arc::new(link),
            session,
            dial: None,
            pending: None,
            events: None,
            commands: rx,
            state: state_tx,
        };
        let task = tokio::spawn(controller.run());

        ParticipantHandle {
            commands: tx,
            state: state_rx,
            task,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = next_event(&mut self.events) => self.on_event(event),
                outcome = next_dial(&mut self.dial) => self.on_dialed(outcome),
                command = self.commands.recv() => match command {
                    Some(ParticipantCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
            self.publish();
        }

        self.drop_link();
        self.session.leave();
        self.publish();
        debug!("Participant controller stopped");
    }

    fn on_event(&mut self, event: Option<ConnectionEvent>) {
        match event {
            Some(ConnectionEvent::Open) => {
                if let Some(connection) = self.pending.take() {
                    self.session.on_open(connection);
                }
            }
            Some(ConnectionEvent::Data(message)) => self.session.on_message(message),
            Some(ConnectionEvent::Closed) | None => {
                self.drop_link();
                self.session.on_close();
            }
            Some(ConnectionEvent::Error(error)) => {
                self.drop_link();
                self.session.on_error(&error);
            }
        }
        if matches!(self.session.status(), LinkStatus::Failed(_)) {
            self.drop_link();
        }
    }

    fn on_command(&mut self, command: ParticipantCommand) {
        match command {
            ParticipantCommand::Join(request, reply) => self.join(request, reply),
            ParticipantCommand::Vote(color, reply) => {
                let result = self.session.vote(color);
                if result.is_err() && matches!(self.session.status(), LinkStatus::Failed(_)) {
                    self.drop_link();
                }
                let _ = reply.send(result);
            }
            ParticipantCommand::Leave(reply) => {
                self.drop_link();
                self.session.leave();
                let _ = reply.send(());
            }
            ParticipantCommand::Shutdown => {}
        }
    }

    /// Start dialing. The reply is sent when the dial settles or is
    /// cancelled; the loop keeps serving commands meanwhile.
    fn join(&mut self, request: JoinRequest, reply: oneshot::Sender<Result<(), ParticipantError>>) {
        let code = request.code.clone();
        if let Err(e) = self.session.begin_join(request) {
            let _ = reply.send(Err(e));
            return;
        }

        let link = self.link.clone();
        let task = tokio::spawn(async move { link.connect(&code).await });
        self.dial = Some(Dial { task, reply });
    }

    fn on_dialed(&mut self, outcome: Result<Result<Dialed<L::Connection>, LinkError>, JoinError>) {
        let Some(dial) = self.dial.take() else {
            return;
        };
        let result = outcome.unwrap_or_else(|e| Err(LinkError::ConnectFailed(e.to_string())));

        match result {
            Ok(dialed) => {
                self.pending = Some(dialed.connection);
                self.events = Some(dialed.events);
                let _ = dial.reply.send(Ok(()));
            }
            Err(e) => {
                self.session.on_connect_failed(&e);
                let _ = dial.reply.send(Err(e.into()));
            }
        }
    }

    fn drop_link(&mut self) {
        if let Some(dial) = self.dial.take() {
            debug!("Cancelling dial in progress");
            dial.task.abort();
            let _ = dial.reply.send(Err(LinkError::Closed.into()));
        }
        if let Some(connection) = self.pending.take() {
            connection.close();
        }
        self.events = None;
    }

    fn publish(&self) {
        self.state.send_replace(ParticipantSnapshot::from(&self.session));
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<ConnectionEvent>>) -> Option<ConnectionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_dial<C>(
    dial: &mut Option<Dial<C>>,
) -> Result<Result<Dialed<C>, LinkError>, JoinError> {
    match dial {
        Some(dial) => (&mut dial.task).await,
        None => std::future::pending().await,
    }
}

/// Handle to a running participant controller.
pub struct ParticipantHandle {
    commands: mpsc::Sender<ParticipantCommand>,
    state: watch::Receiver<ParticipantSnapshot>,
    task: JoinHandle<()>,
}

impl ParticipantHandle {
    /// Validate the join form and dial the host. Resolves once the link is
    /// up; JOIN goes out when the connection reports open.
    pub async fn join(&self, code: &str, name: &str) -> Result<(), ControllerError> {
        let request = JoinRequest::parse(code, name)?;
        let (tx, rx) = oneshot::channel();
        self.send(ParticipantCommand::Join(request, tx)).await?;
        Ok(rx.await.map_err(|_| ControllerError::Stopped)??)
    }

    /// Answer the current question.
    pub async fn vote(&self, color: OptionColor) -> Result<OptionId, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ParticipantCommand::Vote(color, tx)).await?;
        Ok(rx.await.map_err(|_| ControllerError::Stopped)??)
    }

    /// Close the connection and go idle.
    pub async fn leave(&self) -> Result<(), ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ParticipantCommand::Leave(tx)).await?;
        rx.await.map_err(|_| ControllerError::Stopped)
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> ParticipantSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshots.
    pub fn watch(&self) -> watch::Receiver<ParticipantSnapshot> {
        self.state.clone()
    }

    /// Wait until a snapshot satisfies `predicate`.
    pub async fn wait_until(
        &mut self,
        predicate: impl FnMut(&ParticipantSnapshot) -> bool,
    ) -> Result<ParticipantSnapshot, ControllerError> {
        self.state
            .wait_for(predicate)
            .await
            .map(|snapshot| snapshot.clone())
            .map_err(|_| ControllerError::Stopped)
    }

    /// Leave and stop the controller.
    pub async fn shutdown(self) {
        let _ = self.commands.send(ParticipantCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, command: ParticipantCommand) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControllerError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::memory::MemoryLink;

    fn code() -> SessionCode {
        SessionCode::parse("X9K2").unwrap()
    }

    #[tokio::test]
    async fn test_host_status_and_errors() {
        let link = MemoryLink::new();
        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();

        let status = host.status().await.unwrap();
        assert_eq!(status.phase, HostPhase::Lobby);
        assert_eq!(status.question_count, 3);
        assert!(status.view.is_none());

        assert_eq!(
            host.start_game().await,
            Err(ControllerError::Host(HostError::EmptyRoster))
        );
        host.shutdown().await;
        assert_eq!(link.open_addresses(), 0);
    }

    #[tokio::test]
    async fn test_second_host_on_same_code_rejected() {
        let link = MemoryLink::new();
        let first = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        let second = HostController::spawn(&link, code(), Quiz::demo()).await;
        assert!(matches!(second, Err(ControllerError::Link(LinkError::AddressTaken(_)))));
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_join_unknown_code_fails_recoverably() {
        let link = MemoryLink::new();
        let mut player = ParticipantController::spawn(link.clone());

        let err = player.join("ZZZZ", "Ann").await.unwrap_err();
        assert_eq!(err, ControllerError::Participant(ParticipantError::Link(LinkError::HostNotFound("ZZZZ".into()))));
        let snapshot = player
            .wait_until(|s| matches!(s.status, LinkStatus::Failed(_)))
            .await
            .unwrap();
        assert_eq!(snapshot.phase, ParticipantPhase::Lobby);

        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        player.join("x9k2", "Ann").await.unwrap();
        let snapshot = player
            .wait_until(|s| s.game_id.is_some())
            .await
            .unwrap();
        assert_eq!(snapshot.game_id.as_deref(), Some("X9K2"));

        host.shutdown().await;
        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_form_never_dials() {
        let link = MemoryLink::new();
        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        let player = ParticipantController::spawn(link.clone());

        let err = player.join("X9K2", "").await.unwrap_err();
        assert_eq!(err, ControllerError::Participant(ParticipantError::EmptyName));
        assert_eq!(host.status().await.unwrap().connections, 0);
        assert_eq!(player.snapshot().status, LinkStatus::Idle);

        host.shutdown().await;
        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_host_shutdown_fails_participant() {
        let link = MemoryLink::new();
        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        let mut player = ParticipantController::spawn(link.clone());
        player.join("X9K2", "Ann").await.unwrap();
        player.wait_until(|s| s.game_id.is_some()).await.unwrap();

        host.shutdown().await;
        let snapshot = player
            .wait_until(|s| matches!(s.status, LinkStatus::Failed(_)))
            .await
            .unwrap();
        assert_eq!(snapshot.phase, ParticipantPhase::Lobby);
        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_leave_removes_from_roster() {
        let link = MemoryLink::new();
        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        let mut player = ParticipantController::spawn(link.clone());
        player.join("X9K2", "Ann").await.unwrap();
        player.wait_until(|s| s.game_id.is_some()).await.unwrap();
        assert_eq!(host.status().await.unwrap().players, vec!["Ann"]);

        player.leave().await.unwrap();
        assert_eq!(player.snapshot().status, LinkStatus::Idle);
        // The close event races the status request; poll until it lands.
        let mut players = host.status().await.unwrap().players;
        for _ in 0..50 {
            if players.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
            players = host.status().await.unwrap().players;
        }
        assert!(players.is_empty());

        host.shutdown().await;
        player.shutdown().await;
    }

    /// A link whose dials never settle, like an unreachable host that drops
    /// packets.
    #[derive(Clone)]
    struct StalledLink;

    impl PeerLink for StalledLink {
        type Connection = crate::network::memory::MemoryConnection;

        fn open(
            &self,
            address: &SessionCode,
        ) -> impl std::future::Future<Output = Result<Listener<Self::Connection>, LinkError>> + Send
        {
            std::future::ready(Err(LinkError::AddressTaken(address.to_string())))
        }

        fn connect(
            &self,
            _address: &SessionCode,
        ) -> impl std::future::Future<Output = Result<Dialed<Self::Connection>, LinkError>> + Send
        {
            std::future::pending()
        }
    }

    #[tokio::test]
    async fn test_leave_cancels_stalled_dial() {
        let player = ParticipantController::spawn(StalledLink);
        let mut state = player.watch();

        let (joined, left) = tokio::join!(player.join("X9K2", "Ann"), async {
            state
                .wait_for(|s| s.status == LinkStatus::Connecting)
                .await
                .unwrap();
            tokio::time::timeout(std::time::Duration::from_secs(1), player.leave()).await
        });

        assert_eq!(left, Ok(Ok(())));
        assert_eq!(
            joined,
            Err(ControllerError::Participant(ParticipantError::Link(LinkError::Closed)))
        );
        assert_eq!(player.snapshot().status, LinkStatus::Idle);

        tokio::time::timeout(std::time::Duration::from_secs(1), player.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_dial_keeps_serving_commands() {
        let player = ParticipantController::spawn(StalledLink);
        let mut state = player.watch();

        let (_, voted) = tokio::join!(player.join("X9K2", "Ann"), async {
            state
                .wait_for(|s| s.status == LinkStatus::Connecting)
                .await
                .unwrap();
            let voted =
                tokio::time::timeout(std::time::Duration::from_secs(1), player.vote(OptionColor::Red))
                    .await;
            player.leave().await.unwrap();
            voted
        });

        assert!(matches!(
            voted,
            Ok(Err(ControllerError::Participant(ParticipantError::NotAnswering(_))))
        ));
        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_transport_error_fails_participant() {
        let link = MemoryLink::new();
        let mut listener = link.open(&code()).await.unwrap();
        let mut player = ParticipantController::spawn(link.clone());
        player.join("X9K2", "Ann").await.unwrap();

        let host_end = match listener.events.recv().await {
            Some(HostEvent::Connected { connection, .. }) => connection,
            other => panic!("expected connection, got {:?}", other),
        };
        host_end.fail(LinkError::Transport("ice failed".into()));

        let snapshot = player
            .wait_until(|s| matches!(s.status, LinkStatus::Failed(_)))
            .await
            .unwrap();
        assert_eq!(
            snapshot.status,
            LinkStatus::Failed("transport error: ice failed".into())
        );
        assert_eq!(snapshot.phase, ParticipantPhase::Lobby);
        assert!(snapshot.game_id.is_none());

        player.shutdown().await;
    }

    #[tokio::test]
    async fn test_vote_outside_answering_rejected() {
        let link = MemoryLink::new();
        let host = HostController::spawn(&link, code(), Quiz::demo()).await.unwrap();
        let mut player = ParticipantController::spawn(link.clone());
        player.join("X9K2", "Ann").await.unwrap();
        player.wait_until(|s| s.game_id.is_some()).await.unwrap();

        assert_eq!(
            player.vote(OptionColor::Red).await,
            Err(ControllerError::Participant(ParticipantError::NotAnswering(ParticipantPhase::Lobby)))
        );

        host.shutdown().await;
        player.shutdown().await;
    }
}
