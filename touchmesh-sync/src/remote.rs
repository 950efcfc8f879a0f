//! Contact points of every other participant.
//!
//! Presence of a key means that participant had at least one active contact
//! as of its last message. A participant with no contacts is never stored.

use std::collections::HashMap;

use crate::identity::Color;
use crate::touch::{ContactPoint, TouchSample};

/// One remote participant's full contact set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantState {
    pub touches: Vec<ContactPoint>,
    pub color: Color,
}

/// What an update or clear did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// The participant's state was replaced (or created) with this many touches.
    Stored { touches: usize, color: Color },
    /// The participant is absent; `previous` holds what was removed, if anything.
    Cleared { previous: Option<ParticipantState> },
}

/// Remote participant states keyed by participant id.
#[derive(Debug, Clone, Default)]
pub struct RemoteStore {
    participants: HashMap<String, ParticipantState>,
}

impl RemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a participant's state wholesale.
    ///
    /// An empty touch list is treated exactly like a clear.
    pub fn apply_update(
        &mut self,
        participant_id: &str,
        touches: Vec<TouchSample>,
        color: Color,
    ) -> RemoteChange {
        if touches.is_empty() {
            return self.apply_clear(participant_id);
        }

        let touches: Vec<ContactPoint> = touches
            .into_iter()
            .map(|t| ContactPoint::from_sample(t, color))
            .collect();
        let count = touches.len();
        self.participants
            .insert(participant_id.to_string(), ParticipantState { touches, color });

        RemoteChange::Stored { touches: count, color }
    }

    /// Forget a participant. Idempotent.
    pub fn apply_clear(&mut self, participant_id: &str) -> RemoteChange {
        RemoteChange::Cleared {
            previous: self.participants.remove(participant_id),
        }
    }

    /// Number of other participants currently touching.
    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, participant_id: &str) -> Option<&ParticipantState> {
        self.participants.get(participant_id)
    }

    /// Full mapping, for rendering.
    pub fn snapshot_all(&self) -> &HashMap<String, ParticipantState> {
        &self.participants
    }

    /// Drop every participant.
    pub fn clear_all(&mut self) {
        self.participants.clear();
    }
}
