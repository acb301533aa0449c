//! Per-participant rating accumulator.

use shared::ParticipantId;
use std::collections::HashMap;

/// Accumulates match point-deltas per tournament participant.
#[derive(Debug, Clone, Default)]
pub struct RatingTable {
    ratings: HashMap<ParticipantId, i64>,
}

impl RatingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a match point-delta to the participant's rating.
    pub fn apply(&mut self, participant: ParticipantId, delta: i64) {
        *self.ratings.entry(participant).or_insert(0) += delta;
    }

    pub fn get(&self, participant: ParticipantId) -> i64 {
        self.ratings.get(&participant).copied().unwrap_or(0)
    }

    /// Ratings sorted best-first, ties broken by participant id.
    pub fn standings(&self) -> Vec<(ParticipantId, i64)> {
        let mut standings: Vec<(ParticipantId, i64)> = self
            .ratings
            .iter()
            .map(|(&participant, &rating)| (participant, rating))
            .collect();
        standings.sort_by_key(|&(participant, rating)| (-rating, participant));
        standings
    }
}
