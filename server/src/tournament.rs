//! Lifecycle state for one tournament: participant pool, pairing history,
//! open handshakes, and ratings.
//!
//! Phase transitions are monotonic. A finished tournament is never revisited;
//! the orchestrator discards it and opens a fresh lobby under a new id.

use crate::invitations::InvitationPool;
use crate::match_graph::MatchGraph;
use crate::rating::RatingTable;
use crate::store::MatchRow;
use shared::{ParticipantId, TournamentId};
use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentPhase {
    /// Accepting registrations.
    Lobby,
    /// Pairing participants and running matches.
    Matchmaking,
    /// Terminal.
    Finished,
}

pub struct TournamentState {
    pub id: TournamentId,
    pub started_at: Instant,
    /// Ordered so pairing scans are deterministic.
    pub participants: BTreeSet<ParticipantId>,
    pub ratings: RatingTable,
    pub matches: MatchGraph,
    pub invitations: InvitationPool,
    /// Participants currently inside a live tournament session.
    pub playing: HashSet<ParticipantId>,
    pub phase: TournamentPhase,
}

impl TournamentState {
    pub fn new(id: TournamentId, now: Instant) -> Self {
        Self {
            id,
            started_at: now,
            participants: BTreeSet::new(),
            ratings: RatingTable::new(),
            matches: MatchGraph::new(),
            invitations: InvitationPool::new(),
            playing: HashSet::new(),
            phase: TournamentPhase::Lobby,
        }
    }

    /// Rebuilds a tournament from persisted rows after a restart. Each row
    /// contributes one played pairing (inserted symmetrically whichever side
    /// the row was written from) and one rating delta. A rebuilt pool with
    /// participants resumes in `Matchmaking`; an empty one opens as a lobby.
    pub fn from_rows(id: TournamentId, rows: &[MatchRow], now: Instant) -> Self {
        let mut state = Self::new(id, now);
        for row in rows {
            state.participants.insert(row.participant);
            state.participants.insert(row.opponent);
            state.matches.record_played(row.participant, row.opponent);
            state.ratings.apply(row.participant, row.rating_delta);
        }
        if !state.participants.is_empty() {
            state.phase = TournamentPhase::Matchmaking;
        }
        state
    }

    /// Registers a participant while the lobby is open. Returns false once
    /// matchmaking has begun or for duplicates.
    pub fn add_participant(&mut self, participant: ParticipantId) -> bool {
        if self.phase != TournamentPhase::Lobby {
            return false;
        }
        self.participants.insert(participant)
    }

    /// Lobby poll check: promotes to matchmaking once the pool is large
    /// enough. Returns true on the transition.
    pub fn poll_lobby(&mut self, min_participants: usize) -> bool {
        if self.phase == TournamentPhase::Lobby && self.participants.len() >= min_participants {
            self.phase = TournamentPhase::Matchmaking;
            true
        } else {
            false
        }
    }

    pub fn is_round_robin_complete(&self) -> bool {
        self.matches.is_complete(self.participants.len())
    }

    /// Finish predicate, checked once per poll: either every pair has played,
    /// or the expiry bound has passed and the remainder is abandoned rather
    /// than stalling forever on absent players.
    pub fn ready_to_finish(
        &self,
        min_participants: usize,
        now: Instant,
        expiry: Duration,
    ) -> bool {
        let complete =
            self.participants.len() >= min_participants && self.is_round_robin_complete();
        complete || now.duration_since(self.started_at) > expiry
    }

    /// One unplayed pair among participants that are reachable, not
    /// mid-handshake, and not already playing.
    pub fn next_pair(
        &self,
        reachable: &HashSet<ParticipantId>,
    ) -> Option<(ParticipantId, ParticipantId)> {
        let candidates: Vec<ParticipantId> = self
            .participants
            .iter()
            .copied()
            .filter(|participant| reachable.contains(participant))
            .filter(|participant| !self.invitations.has_open(*participant))
            .filter(|participant| !self.playing.contains(participant))
            .collect();
        self.matches.find_unplayed_pair(&candidates)
    }

    pub fn mark_playing(&mut self, a: ParticipantId, b: ParticipantId) {
        self.playing.insert(a);
        self.playing.insert(b);
    }

    /// Applies a finished tournament match: records the pairing, credits each
    /// side with its point-delta, and frees both participants for the next
    /// pairing.
    pub fn record_result(&mut self, a: ParticipantId, b: ParticipantId, score: (u32, u32)) {
        self.matches.record_played(a, b);
        let delta = i64::from(score.0) - i64::from(score.1);
        self.ratings.apply(a, delta);
        self.ratings.apply(b, -delta);
        self.playing.remove(&a);
        self.playing.remove(&b);
    }

    pub fn finish(&mut self) {
        self.phase = TournamentPhase::Finished;
    }
}
