//! Outbound edges of the engine: per-tick state broadcast and tournament
//! notifications.
//!
//! Both sinks are fire-and-forget from the caller's perspective. A slow or
//! failing consumer must never stall a tick loop, so implementations do their
//! own buffering or drop on the floor.

use log::{debug, info};
use shared::{ParticipantId, SessionId, TournamentId, Update};
use std::sync::Mutex;

/// Receives each participant's per-tick view and terminal result messages.
pub trait StateSink: Send + Sync {
    fn dispatch(&self, participant: ParticipantId, update: &Update);
}

/// Default sink for the binary: logs traffic instead of sending it anywhere.
pub struct LogSink;

impl StateSink for LogSink {
    fn dispatch(&self, participant: ParticipantId, update: &Update) {
        match update {
            Update::State { session_id, .. } => {
                debug!("session {} -> participant {}: state", session_id, participant);
            }
            Update::Finished {
                session_id,
                outcome,
                own_score,
                opponent_score,
            } => {
                info!(
                    "session {} -> participant {}: {:?} {}:{}",
                    session_id, participant, outcome, own_score, opponent_score
                );
            }
        }
    }
}

/// Collects dispatched updates so tests can assert on broadcast traffic.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<(ParticipantId, Update)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(ParticipantId, Update)> {
        std::mem::take(&mut *self.updates.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateSink for RecordingSink {
    fn dispatch(&self, participant: ParticipantId, update: &Update) {
        self.updates.lock().unwrap().push((participant, update.clone()));
    }
}

/// Social events emitted while a tournament advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TournamentEvent {
    InviteOffered {
        tournament_id: TournamentId,
        opponent: ParticipantId,
    },
    InviteAnswered {
        opponent: ParticipantId,
        accepted: bool,
    },
    MatchAssigned {
        session_id: SessionId,
        opponent: ParticipantId,
    },
    TournamentFinished {
        tournament_id: TournamentId,
    },
    TournamentCancelled {
        tournament_id: TournamentId,
    },
}

/// Delivers tournament events to an external messaging collaborator.
pub trait Notifier: Send + Sync {
    fn notify(&self, participant: ParticipantId, event: &TournamentEvent);
}

/// Default notifier for the binary: logs events.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, participant: ParticipantId, event: &TournamentEvent) {
        info!("notify participant {}: {:?}", participant, event);
    }
}

/// Collects notifications so tests can assert on the social event stream.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(ParticipantId, TournamentEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(ParticipantId, TournamentEvent)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, participant: ParticipantId, event: &TournamentEvent) {
        self.events.lock().unwrap().push((participant, event.clone()));
    }
}
