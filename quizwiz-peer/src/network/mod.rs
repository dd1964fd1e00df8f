//! Network Layer
//!
//! The peer link abstraction, its two transports, the wire protocol and the
//! controllers that connect link events to the session state machines.
//! Game rules live in `session/`; nothing here decides phase changes.

pub mod controller;
pub mod join;
pub mod link;
pub mod memory;
pub mod protocol;
pub mod websocket;

pub use controller::{
    ControllerError, HostController, HostHandle, HostStatus, ParticipantController,
    ParticipantHandle, ParticipantSnapshot,
};
pub use join::{code_from_join_url, join_url, JoinUrlError};
pub use link::{ConnectionEvent, Dialed, HostEvent, LinkError, Listener, PeerConnection, PeerLink};
pub use memory::{MemoryConnection, MemoryLink};
pub use protocol::{PeerMessage, Role};
pub use websocket::{WsConnection, WsLink};
