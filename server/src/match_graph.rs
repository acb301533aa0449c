//! Round-robin bookkeeping: which tournament pairs have already played.

use shared::ParticipantId;
use std::collections::{HashMap, HashSet};

/// Undirected "has played" relation over tournament participants.
///
/// Both directions are stored: if A played B then B's set contains A and vice
/// versa, and every mutation maintains that symmetry.
#[derive(Debug, Clone, Default)]
pub struct MatchGraph {
    played: HashMap<ParticipantId, HashSet<ParticipantId>>,
}

impl MatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `a` and `b` have played each other. Recording the same
    /// pair twice is a no-op, as is a self-pairing.
    pub fn record_played(&mut self, a: ParticipantId, b: ParticipantId) {
        if a == b {
            return;
        }
        self.played.entry(a).or_default().insert(b);
        self.played.entry(b).or_default().insert(a);
    }

    pub fn have_played(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.played
            .get(&a)
            .map(|opponents| opponents.contains(&b))
            .unwrap_or(false)
    }

    pub fn played_count(&self, participant: ParticipantId) -> usize {
        self.played
            .get(&participant)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Greedy single-pair search: scans the tail for the first candidate's
    /// first unplayed opponent, then drops the head and retries. Returns at
    /// most one pair per invocation; callers invoke it once per matchmaking
    /// tick.
    pub fn find_unplayed_pair(
        &self,
        candidates: &[ParticipantId],
    ) -> Option<(ParticipantId, ParticipantId)> {
        let mut rest = candidates;
        while let Some((&first, tail)) = rest.split_first() {
            for &other in tail {
                if other != first && !self.have_played(first, other) {
                    return Some((first, other));
                }
            }
            rest = tail;
        }
        None
    }

    /// True once every one of `total` participants has played all the others
    /// exactly once.
    pub fn is_complete(&self, total: usize) -> bool {
        if total <= 1 {
            return true;
        }
        self.played.len() == total
            && self
                .played
                .values()
                .all(|opponents| opponents.len() == total - 1)
    }
}
