//! Peer Link
//!
//! The transport capability both controllers consume. A link can `open` an
//! address and receive connections on it (host), or `connect` to an address
//! (participant). Delivery is in order per connection; nothing is promised
//! across connections.

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::core::code::SessionCode;
use crate::core::id::ConnectionId;
use crate::network::protocol::PeerMessage;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Another peer already holds the requested address.
    #[error("address {0} is already taken")]
    AddressTaken(String),

    /// Nobody is listening at the address.
    #[error("no host found for code {0}")]
    HostNotFound(String),

    /// Could not establish the connection.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// Outgoing buffer is full.
    #[error("send buffer full")]
    Backpressure,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl<T> From<mpsc::error::TrySendError<T>> for LinkError {
    fn from(e: mpsc::error::TrySendError<T>) -> Self {
        match e {
            mpsc::error::TrySendError::Full(_) => LinkError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => LinkError::Closed,
        }
    }
}

/// Handle for sending on one established connection.
///
/// `send` never waits: it queues the message or fails immediately.
pub trait PeerConnection: Clone + Send + 'static {
    /// Connection identifier.
    fn id(&self) -> &ConnectionId;

    /// Queue a message for delivery.
    fn send(&self, message: &PeerMessage) -> Result<(), LinkError>;

    /// Close the connection. Idempotent.
    fn close(&self);
}

/// Events delivered to the side that opened an address.
#[derive(Debug)]
pub enum HostEvent<C> {
    /// A peer connected.
    Connected {
        /// Connection id.
        id: ConnectionId,
        /// Handle for replying and broadcasting.
        connection: C,
    },
    /// A decoded message arrived.
    Data {
        /// Sending connection.
        id: ConnectionId,
        /// Message.
        message: PeerMessage,
    },
    /// A connection closed.
    Closed {
        /// Connection id.
        id: ConnectionId,
    },
    /// A connection failed.
    Error {
        /// Connection id.
        id: ConnectionId,
        /// Failure.
        error: LinkError,
    },
}

/// Events delivered to the side that connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection is ready for sending.
    Open,
    /// A decoded message arrived.
    Data(PeerMessage),
    /// Remote end closed.
    Closed,
    /// Connection failed.
    Error(LinkError),
}

/// An opened address and the stream of its connection events.
///
/// Dropping the listener stops accepting new connections.
pub struct Listener<C> {
    /// Address peers connect to.
    pub address: SessionCode,
    /// Incoming events.
    pub events: mpsc::Receiver<HostEvent<C>>,
    /// Socket address, for transports that bind one.
    pub local_addr: Option<SocketAddr>,
    guard: Option<tokio::task::JoinHandle<()>>,
}

impl<C> Listener<C> {
    /// Build a listener without a background task.
    pub fn new(address: SessionCode, events: mpsc::Receiver<HostEvent<C>>) -> Self {
        Self { address, events, local_addr: None, guard: None }
    }

    /// Build a listener whose accept task is aborted on drop.
    pub fn with_task(
        address: SessionCode,
        events: mpsc::Receiver<HostEvent<C>>,
        task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self { address, events, local_addr: None, guard: Some(task) }
    }

    /// Record the socket address the listener is bound to.
    pub fn bound_to(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }
}

impl<C> Drop for Listener<C> {
    fn drop(&mut self) {
        if let Some(task) = self.guard.take() {
            task.abort();
        }
    }
}

/// An outgoing connection and its event stream.
pub struct Dialed<C> {
    /// Handle for sending.
    pub connection: C,
    /// Events for this connection.
    pub events: mpsc::Receiver<ConnectionEvent>,
}

/// The transport capability.
pub trait PeerLink: Send + Sync {
    /// Connection handle type.
    type Connection: PeerConnection;

    /// Register `address` and start receiving connections on it.
    fn open(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Listener<Self::Connection>, LinkError>> + Send;

    /// Connect to the peer registered at `address`.
    fn connect(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Dialed<Self::Connection>, LinkError>> + Send;
}

/// Default capacity for per-connection queues.
pub const CHANNEL_CAPACITY: usize = 64;
