//! Durable match/tournament store contract.
//!
//! The engine treats persistence purely as a source and sink of rows: it
//! inserts finished match results, asks for the active tournament at startup,
//! and replays that tournament's rows during reconciliation. The relational
//! schema behind these operations belongs to the external store.

use serde::{Deserialize, Serialize};
use shared::{ParticipantId, TournamentId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Errors surfaced by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

/// One persisted match result, seen from one participant's side. A finished
/// match produces two rows, one per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRow {
    pub participant: ParticipantId,
    pub opponent: ParticipantId,
    pub rating_delta: i64,
    /// None for quick (pvp/pvc) matches.
    pub tournament_id: Option<TournamentId>,
    pub timestamp_ms: u64,
}

/// Abstract durable store for match results and tournament lifecycle marks.
pub trait MatchStore: Send + Sync {
    fn insert_match(&self, row: MatchRow) -> Result<(), StoreError>;
    /// The most recent tournament not yet marked finished, if any.
    fn active_tournament(&self) -> Result<Option<TournamentId>, StoreError>;
    fn tournament_rows(&self, id: TournamentId) -> Result<Vec<MatchRow>, StoreError>;
    fn mark_tournament_finished(&self, id: TournamentId) -> Result<(), StoreError>;
}

/// Current wall-clock timestamp in milliseconds, for persisted rows.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[derive(Default)]
struct MemoryStoreInner {
    rows: Vec<MatchRow>,
    active: Option<TournamentId>,
    finished: HashSet<TournamentId>,
}

/// In-memory store backing the binary and the tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows inserted so far, for inspection in tests.
    pub fn rows(&self) -> Vec<MatchRow> {
        self.inner.lock().unwrap().rows.clone()
    }
}

impl MatchStore for MemoryStore {
    fn insert_match(&self, row: MatchRow) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tournament_id) = row.tournament_id {
            if !inner.finished.contains(&tournament_id) {
                inner.active = Some(tournament_id);
            }
        }
        inner.rows.push(row);
        Ok(())
    }

    fn active_tournament(&self) -> Result<Option<TournamentId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.active.filter(|id| !inner.finished.contains(id)))
    }

    fn tournament_rows(&self, id: TournamentId) -> Result<Vec<MatchRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|row| row.tournament_id == Some(id))
            .cloned()
            .collect())
    }

    fn mark_tournament_finished(&self, id: TournamentId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.finished.insert(id);
        if inner.active == Some(id) {
            inner.active = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(participant: ParticipantId, opponent: ParticipantId, tournament: Option<TournamentId>) -> MatchRow {
        MatchRow {
            participant,
            opponent,
            rating_delta: 4,
            tournament_id: tournament,
            timestamp_ms: timestamp_ms(),
        }
    }

    #[test]
    fn test_tournament_rows_are_filtered_by_id() {
        let store = MemoryStore::new();
        store.insert_match(row(1, 2, Some(7))).unwrap();
        store.insert_match(row(3, 4, Some(8))).unwrap();
        store.insert_match(row(5, 6, None)).unwrap();

        let rows = store.tournament_rows(7).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].participant, 1);
    }

    #[test]
    fn test_active_tournament_tracks_unfinished_inserts() {
        let store = MemoryStore::new();
        assert_eq!(store.active_tournament().unwrap(), None);

        store.insert_match(row(1, 2, None)).unwrap();
        assert_eq!(store.active_tournament().unwrap(), None);

        store.insert_match(row(1, 2, Some(7))).unwrap();
        assert_eq!(store.active_tournament().unwrap(), Some(7));

        store.mark_tournament_finished(7).unwrap();
        assert_eq!(store.active_tournament().unwrap(), None);

        // Late rows for a finished tournament do not resurrect it.
        store.insert_match(row(2, 1, Some(7))).unwrap();
        assert_eq!(store.active_tournament().unwrap(), None);
    }
}
