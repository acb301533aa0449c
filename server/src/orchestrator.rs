//! Top-level polling driver for the tournament lifecycle.
//!
//! The orchestrator owns exactly one tournament at a time. A fixed-period
//! poll advances the lifecycle by one phase check; session-completion
//! callbacks and invitation answers arrive on other tasks. Both write paths
//! are serialized through the same mutex, and all collaborators (registry,
//! store, notifier, clock) are injected at construction.

use crate::clock::Clock;
use crate::outbound::{Notifier, TournamentEvent};
use crate::registry::{SessionOutcome, SessionRegistry};
use crate::store::{timestamp_ms, MatchRow, MatchStore};
use crate::tournament::{TournamentPhase, TournamentState};
use log::{debug, error, info, warn};
use shared::{ParticipantId, SessionId, SessionMode, TournamentId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
pub struct TournamentSettings {
    /// Registrations needed before matchmaking begins.
    pub min_participants: usize,
    /// Bound after which an incomplete round-robin is abandoned.
    pub expiry: Duration,
    /// Period of the lifecycle poll.
    pub poll_period: Duration,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            min_participants: 3,
            expiry: Duration::from_secs(15 * 60),
            poll_period: Duration::from_secs(60),
        }
    }
}

struct OrchestratorInner {
    tournament: TournamentState,
    /// Participants currently online; only these are paired.
    reachable: HashSet<ParticipantId>,
    /// False until the store has been consulted successfully; retried on
    /// later polls while false.
    reconciled: bool,
    next_id: TournamentId,
}

pub struct TournamentOrchestrator {
    inner: Mutex<OrchestratorInner>,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn MatchStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: TournamentSettings,
}

impl TournamentOrchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn MatchStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: TournamentSettings,
    ) -> Arc<Self> {
        let now = clock.now();
        Arc::new(Self {
            inner: Mutex::new(OrchestratorInner {
                tournament: TournamentState::new(1, now),
                reachable: HashSet::new(),
                reconciled: false,
                next_id: 2,
            }),
            registry,
            store,
            notifier,
            clock,
            settings,
        })
    }

    /// Startup reconciliation: rebuilds the tournament from persisted rows if
    /// the store reports one still unfinished. When the store is unavailable
    /// the orchestrator starts with an empty lobby and retries on a later
    /// poll instead of crashing.
    pub async fn reconcile_from_store(&self) {
        let mut inner = self.inner.lock().await;
        self.reconcile_locked(&mut inner);
    }

    fn reconcile_locked(&self, inner: &mut OrchestratorInner) {
        let active = match self.store.active_tournament() {
            Ok(active) => active,
            Err(e) => {
                warn!("Store unavailable during reconciliation, starting empty: {}", e);
                inner.reconciled = false;
                return;
            }
        };

        let Some(id) = active else {
            inner.reconciled = true;
            return;
        };

        match self.store.tournament_rows(id) {
            Ok(rows) => {
                let state = TournamentState::from_rows(id, &rows, self.clock.now());
                info!(
                    "Reconciled tournament {}: {} participants from {} rows",
                    id,
                    state.participants.len(),
                    rows.len()
                );
                inner.next_id = inner.next_id.max(id + 1);
                inner.tournament = state;
                inner.reconciled = true;
            }
            Err(e) => {
                warn!("Store unavailable while replaying tournament {}: {}", id, e);
                inner.reconciled = false;
            }
        }
    }

    /// Registers a tournament participant and marks them reachable.
    /// Registration is only open while the lobby is.
    pub async fn register_participant(&self, participant: ParticipantId) -> bool {
        let mut inner = self.inner.lock().await;
        inner.reachable.insert(participant);
        let added = inner.tournament.add_participant(participant);
        if added {
            info!(
                "Participant {} joined tournament {} ({} registered)",
                participant,
                inner.tournament.id,
                inner.tournament.participants.len()
            );
        } else {
            debug!(
                "Registration for {} ignored in phase {:?}",
                participant, inner.tournament.phase
            );
        }
        added
    }

    pub async fn set_reachable(&self, participant: ParticipantId) {
        self.inner.lock().await.reachable.insert(participant);
    }

    /// Marks a participant offline and cancels any handshake they were in.
    pub async fn set_unreachable(&self, participant: ParticipantId) {
        let mut inner = self.inner.lock().await;
        inner.reachable.remove(&participant);
        if inner.tournament.invitations.cancel(participant) {
            debug!("Cancelled open invitation for offline participant {}", participant);
        }
    }

    /// Applies one side's invitation answer. Once both sides have answered,
    /// a both-accept resolution creates the tournament session; any other
    /// combination cancels the pairing, leaving the pair eligible for a
    /// later poll.
    pub async fn handle_invitation_response(
        &self,
        participant: ParticipantId,
        accept: bool,
    ) -> Option<SessionId> {
        let mut inner = self.inner.lock().await;
        let resolved = inner.tournament.invitations.respond(participant, accept)?;

        self.notifier.notify(
            resolved.a,
            &TournamentEvent::InviteAnswered {
                opponent: resolved.b,
                accepted: resolved.accepted_b,
            },
        );
        self.notifier.notify(
            resolved.b,
            &TournamentEvent::InviteAnswered {
                opponent: resolved.a,
                accepted: resolved.accepted_a,
            },
        );

        if !resolved.both_accepted() {
            debug!("Pairing {} vs {} declined", resolved.a, resolved.b);
            return None;
        }

        let session_id = self
            .registry
            .create(resolved.a, resolved.b, SessionMode::Tournament)
            .await;
        inner.tournament.mark_playing(resolved.a, resolved.b);
        self.notifier.notify(
            resolved.a,
            &TournamentEvent::MatchAssigned {
                session_id,
                opponent: resolved.b,
            },
        );
        self.notifier.notify(
            resolved.b,
            &TournamentEvent::MatchAssigned {
                session_id,
                opponent: resolved.a,
            },
        );
        Some(session_id)
    }

    /// Feeds a finished session back into the match graph, the rating table,
    /// and the store. Persistence is best-effort: a failed insert is logged,
    /// never allowed to disturb the running matches.
    pub async fn handle_session_outcome(&self, outcome: &SessionOutcome) {
        let (a, b) = outcome.participants;

        let tournament_id = if outcome.mode == SessionMode::Tournament {
            let mut inner = self.inner.lock().await;
            inner.tournament.record_result(a, b, outcome.score);
            Some(inner.tournament.id)
        } else {
            None
        };

        let delta = i64::from(outcome.score.0) - i64::from(outcome.score.1);
        let now = timestamp_ms();
        let rows = [
            MatchRow {
                participant: a,
                opponent: b,
                rating_delta: delta,
                tournament_id,
                timestamp_ms: now,
            },
            MatchRow {
                participant: b,
                opponent: a,
                rating_delta: -delta,
                tournament_id,
                timestamp_ms: now,
            },
        ];
        for row in rows {
            if let Err(e) = self.store.insert_match(row) {
                error!(
                    "Failed to persist result of session {}: {}",
                    outcome.session_id, e
                );
            }
        }
    }

    /// Advances the tournament by exactly one phase check.
    pub async fn poll(&self) {
        let mut inner = self.inner.lock().await;

        if !inner.reconciled {
            self.reconcile_locked(&mut inner);
        }

        match inner.tournament.phase {
            TournamentPhase::Lobby => {
                if inner.tournament.poll_lobby(self.settings.min_participants) {
                    info!(
                        "Tournament {} begins matchmaking with {} participants",
                        inner.tournament.id,
                        inner.tournament.participants.len()
                    );
                }
            }
            TournamentPhase::Matchmaking => {
                let now = self.clock.now();
                if inner.tournament.ready_to_finish(
                    self.settings.min_participants,
                    now,
                    self.settings.expiry,
                ) {
                    self.finish_tournament(&mut inner);
                } else if let Some((a, b)) = inner.tournament.next_pair(&inner.reachable) {
                    match inner.tournament.invitations.open(a, b) {
                        Ok(()) => {
                            let tournament_id = inner.tournament.id;
                            info!("Tournament {}: inviting {} vs {}", tournament_id, a, b);
                            self.notifier.notify(
                                a,
                                &TournamentEvent::InviteOffered {
                                    tournament_id,
                                    opponent: b,
                                },
                            );
                            self.notifier.notify(
                                b,
                                &TournamentEvent::InviteOffered {
                                    tournament_id,
                                    opponent: a,
                                },
                            );
                        }
                        Err(e) => warn!(
                            "Tournament {}: could not open invitation: {}",
                            inner.tournament.id, e
                        ),
                    }
                }
            }
            TournamentPhase::Finished => {
                let id = inner.next_id;
                inner.next_id += 1;
                info!("Tournament cycle complete, opening lobby {}", id);
                inner.tournament = TournamentState::new(id, self.clock.now());
            }
        }
    }

    fn finish_tournament(&self, inner: &mut OrchestratorInner) {
        let id = inner.tournament.id;
        let complete = inner.tournament.is_round_robin_complete();
        inner.tournament.finish();

        if let Err(e) = self.store.mark_tournament_finished(id) {
            error!("Failed to mark tournament {} finished: {}", id, e);
        }

        let event = if complete {
            TournamentEvent::TournamentFinished { tournament_id: id }
        } else {
            TournamentEvent::TournamentCancelled { tournament_id: id }
        };
        for &participant in &inner.tournament.participants {
            self.notifier.notify(participant, &event);
        }
        info!(
            "Tournament {} {}",
            id,
            if complete { "finished" } else { "expired incomplete" }
        );
    }

    /// Drives `poll` on the configured period until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.settings.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.poll().await;
        }
    }

    // Introspection for callers and tests.

    pub async fn phase(&self) -> TournamentPhase {
        self.inner.lock().await.tournament.phase
    }

    pub async fn tournament_id(&self) -> TournamentId {
        self.inner.lock().await.tournament.id
    }

    pub async fn participant_count(&self) -> usize {
        self.inner.lock().await.tournament.participants.len()
    }

    pub async fn rating(&self, participant: ParticipantId) -> i64 {
        self.inner.lock().await.tournament.ratings.get(participant)
    }

    pub async fn have_played(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.inner.lock().await.tournament.matches.have_played(a, b)
    }
}
