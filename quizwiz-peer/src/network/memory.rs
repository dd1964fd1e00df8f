//! In-Process Link
//!
//! A switchboard that connects hosts and participants living in the same
//! process. Messages still pass through the JSON codec so the wire contract
//! is exercised end to end.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::code::SessionCode;
use crate::core::id::ConnectionId;
use crate::network::link::{
    ConnectionEvent, Dialed, HostEvent, LinkError, Listener, PeerConnection, PeerLink,
    CHANNEL_CAPACITY,
};
use crate::network::protocol::PeerMessage;

type HostSender = mpsc::Sender<HostEvent<MemoryConnection>>;

/// Shared switchboard. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct MemoryLink {
    hosts: Arc<Mutex<HashMap<SessionCode, HostSender>>>,
}

impl MemoryLink {
    /// Empty switchboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with a live listener.
    pub fn open_addresses(&self) -> usize {
        self.hosts.lock().values().filter(|tx| !tx.is_closed()).count()
    }
}

impl PeerLink for MemoryLink {
    type Connection = MemoryConnection;

    fn open(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Listener<MemoryConnection>, LinkError>> + Send {
        let hosts = self.hosts.clone();
        let address = address.clone();
        async move {
            let mut hosts = hosts.lock();
            // Drop listeners that went away without anyone dialing them.
            hosts.retain(|_, tx| !tx.is_closed());
            if hosts.contains_key(&address) {
                return Err(LinkError::AddressTaken(address.to_string()));
            }
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY * 4);
            hosts.insert(address.clone(), tx);
            debug!("Switchboard opened {}", address);
            Ok(Listener::new(address, rx))
        }
    }

    fn connect(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Dialed<MemoryConnection>, LinkError>> + Send {
        let hosts = self.hosts.clone();
        let address = address.clone();
        async move {
            let to_host = {
                let mut hosts = hosts.lock();
                match hosts.get(&address) {
                    Some(tx) if !tx.is_closed() => tx.clone(),
                    Some(_) => {
                        hosts.remove(&address);
                        return Err(LinkError::HostNotFound(address.to_string()));
                    }
                    None => return Err(LinkError::HostNotFound(address.to_string())),
                }
            };

            let (to_peer, peer_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let pipe = Arc::new(Pipe {
                closed: AtomicBool::new(false),
                to_host,
                to_peer,
            });
            let id = ConnectionId::random();
            let host_end = MemoryConnection { id: id.clone(), pipe: pipe.clone(), side: Side::Host };
            let peer_end = MemoryConnection { id: id.clone(), pipe: pipe.clone(), side: Side::Peer };

            pipe.to_host
                .send(HostEvent::Connected { id: id.clone(), connection: host_end })
                .await
                .map_err(|_| LinkError::HostNotFound(address.to_string()))?;
            pipe.to_peer
                .send(ConnectionEvent::Open)
                .await
                .map_err(|_| LinkError::Closed)?;

            debug!("Switchboard connected {} to {}", id.short(), address);
            Ok(Dialed { connection: peer_end, events: peer_rx })
        }
    }
}

struct Pipe {
    closed: AtomicBool,
    to_host: HostSender,
    to_peer: mpsc::Sender<ConnectionEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Host,
    Peer,
}

/// One end of an in-process connection.
#[derive(Clone)]
pub struct MemoryConnection {
    id: ConnectionId,
    pipe: Arc<Pipe>,
    side: Side,
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MemoryConnection {
    /// Whether either end has closed.
    pub fn is_closed(&self) -> bool {
        self.pipe.closed.load(Ordering::SeqCst)
    }

    /// Kill the connection with an error. The remote end sees an error event
    /// instead of a close.
    pub fn fail(&self, error: LinkError) {
        if self.pipe.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.side {
            Side::Host => {
                let _ = self.pipe.to_peer.try_send(ConnectionEvent::Error(error));
            }
            Side::Peer => {
                let _ = self.pipe.to_host.try_send(HostEvent::Error { id: self.id.clone(), error });
            }
        }
    }
}

impl PeerConnection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, message: &PeerMessage) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        let frame = message.to_json().map_err(|e| LinkError::Transport(e.to_string()))?;
        let Some(message) = PeerMessage::decode(&frame) else {
            return Ok(());
        };
        match self.side {
            Side::Host => self.pipe.to_peer.try_send(ConnectionEvent::Data(message))?,
            Side::Peer => self.pipe.to_host.try_send(HostEvent::Data { id: self.id.clone(), message })?,
        }
        Ok(())
    }

    fn close(&self) {
        if self.pipe.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.side {
            Side::Host => {
                let _ = self.pipe.to_peer.try_send(ConnectionEvent::Closed);
            }
            Side::Peer => {
                let _ = self.pipe.to_host.try_send(HostEvent::Closed { id: self.id.clone() });
            }
        }
    }
}
