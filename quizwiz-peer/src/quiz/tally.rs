//! Vote Tally
//!
//! Counts votes for the question currently being played. The host owns the
//! only tally and clears it on every transition into PLAYING.

use std::collections::BTreeMap;

use crate::core::id::ConnectionId;
use crate::quiz::model::OptionId;

/// Outcome of casting a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOutcome {
    /// Vote counted.
    Counted,
    /// Voter already has a counted vote for this question.
    AlreadyVoted,
}

/// Per-question vote counts.
///
/// Option ids are not checked against the question; whatever id arrives is
/// counted. Each voter is counted at most once until the next `clear`, and a
/// voter's vote can be taken back with `retract`.
#[derive(Clone, Debug, Default)]
pub struct VoteTally {
    counts: BTreeMap<OptionId, u32>,
    voters: BTreeMap<ConnectionId, OptionId>,
}

impl VoteTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a vote from `voter` for `option`.
    pub fn cast(&mut self, voter: &ConnectionId, option: OptionId) -> CastOutcome {
        if self.voters.contains_key(voter) {
            return CastOutcome::AlreadyVoted;
        }
        self.voters.insert(voter.clone(), option.clone());
        *self.counts.entry(option).or_insert(0) += 1;
        CastOutcome::Counted
    }

    /// Take back the vote `voter` cast, if any. Returns the option it was
    /// counted for.
    pub fn retract(&mut self, voter: &ConnectionId) -> Option<OptionId> {
        let option = self.voters.remove(voter)?;
        if let Some(count) = self.counts.get_mut(&option) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&option);
            }
        }
        Some(option)
    }

    /// Votes for `option`.
    pub fn count(&self, option: &OptionId) -> u32 {
        self.counts.get(option).copied().unwrap_or(0)
    }

    /// Votes across all options.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Whether `voter` has a counted vote.
    pub fn has_voted(&self, voter: &ConnectionId) -> bool {
        self.voters.contains_key(voter)
    }

    /// True if no votes are counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Counts by option id, in id order.
    pub fn counts(&self) -> &BTreeMap<OptionId, u32> {
        &self.counts
    }

    /// Forget every vote and voter.
    pub fn clear(&mut self) {
        self.counts.clear();
        self.voters.clear();
    }

    /// Share of `option` relative to `players`, in percent. A zero player
    /// count is treated as one so the projector never divides by zero.
    pub fn share_percent(&self, option: &OptionId, players: usize) -> u32 {
        let base = players.max(1) as u64;
        ((self.count(option) as u64 * 100) / base).min(100) as u32
    }
}
