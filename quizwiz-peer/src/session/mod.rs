//! Session State Machines
//!
//! Host and participant sides of a quiz session. Both are plain state
//! machines over an abstract connection type; the controllers in
//! `network::controller` drive them from link events.

pub mod host;
pub mod participant;
pub mod roster;

#[cfg(test)]
pub(crate) mod recording;

pub use host::{Advance, HostError, HostPhase, HostSession, OptionStanding, QuestionView};
pub use participant::{
    JoinRequest, LinkStatus, ParticipantError, ParticipantPhase, ParticipantSession, MAX_NAME_LEN,
};
pub use roster::{Participant, Roster};
