//! # QuizWiz Peer
//!
//! Live quiz sessions over a direct link between one host and its
//! participants, with no game server in between.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      QUIZWIZ PEER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Identifiers                            │
//! │  ├── code.rs        - 4-character session codes              │
//! │  └── id.rs          - Connection ids                         │
//! │                                                              │
//! │  quiz/              - Quiz documents                         │
//! │  ├── model.rs       - Quiz, question, option, validation     │
//! │  ├── store.rs       - JSON file and in-memory stores         │
//! │  └── tally.rs       - Per-question vote counts               │
//! │                                                              │
//! │  session/           - State machines (no I/O)                │
//! │  ├── host.rs        - LOBBY / PLAYING / REVEAL               │
//! │  ├── participant.rs - LOBBY / ANSWERING / SUBMITTED / RESULT │
//! │  └── roster.rs      - Joined participants                    │
//! │                                                              │
//! │  network/           - Links and controllers                  │
//! │  ├── protocol.rs    - Six-message wire format                │
//! │  ├── link.rs        - PeerLink / PeerConnection traits       │
//! │  ├── memory.rs      - In-process switchboard                 │
//! │  ├── websocket.rs   - WebSocket transport                    │
//! │  ├── controller.rs  - One task per role                      │
//! │  └── join.rs        - Join links                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The host is authoritative. Participants change phase only on host
//! broadcasts or their own vote, and every message that arrives in the wrong
//! phase is ignored rather than treated as an error. A dropped connection
//! removes the participant from the roster; a participant that loses its link
//! returns to the lobby and may join again.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod network;
pub mod quiz;
pub mod session;

// Re-export commonly used types
pub use crate::core::{ConnectionId, SessionCode};
pub use network::{HostController, MemoryLink, PeerLink, PeerMessage, WsLink};
pub use quiz::{OptionColor, Quiz, QuizStore};
pub use session::{HostPhase, HostSession, ParticipantPhase, ParticipantSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
