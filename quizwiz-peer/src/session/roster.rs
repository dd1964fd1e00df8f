//! Participant roster, in join order.

use chrono::{DateTime, Utc};

use crate::core::id::ConnectionId;

/// A joined participant. One per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Connection the participant joined on.
    pub id: ConnectionId,
    /// Display name as sent in JOIN, trimmed.
    pub name: String,
    /// When the JOIN was accepted.
    pub joined_at: DateTime<Utc>,
}

/// Joined participants. Insertion order is preserved.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<Participant>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant unless the connection already joined.
    /// Returns false for a duplicate.
    pub fn insert(&mut self, id: ConnectionId, name: &str) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.entries.push(Participant {
            id,
            name: name.trim().to_string(),
            joined_at: Utc::now(),
        });
        true
    }

    /// Remove the participant on `id`, if any.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Participant> {
        let pos = self.entries.iter().position(|p| &p.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Whether `id` has joined.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.iter().any(|p| &p.id == id)
    }

    /// Look up a participant.
    pub fn get(&self, id: &ConnectionId) -> Option<&Participant> {
        self.entries.iter().find(|p| &p.id == id)
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nobody has joined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Participants in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter()
    }

    /// Display names in join order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.name.clone()).collect()
    }

    /// Remove everyone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
