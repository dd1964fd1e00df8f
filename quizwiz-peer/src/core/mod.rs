//! Identifiers shared by both roles.

pub mod code;
pub mod id;

pub use code::{CodeError, SessionCode, CODE_ALPHABET, CODE_LENGTH};
pub use id::ConnectionId;
