//! Connection double that records what the session sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::id::ConnectionId;
use crate::network::link::{LinkError, PeerConnection};
use crate::network::protocol::PeerMessage;

#[derive(Debug, Clone)]
pub struct RecordingConnection {
    id: ConnectionId,
    sent: Arc<Mutex<Vec<PeerMessage>>>,
    closed: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl RecordingConnection {
    pub fn new(id: &str) -> Self {
        Self {
            id: ConnectionId::new(id),
            sent: Arc::default(),
            closed: Arc::default(),
            broken: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<PeerMessage> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<PeerMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make every further send fail.
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl PeerConnection for RecordingConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, message: &PeerMessage) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(LinkError::Backpressure);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
