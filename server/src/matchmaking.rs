//! Quick one-off pairing for pvp and pvc matches.

use crate::registry::SessionRegistry;
use log::{debug, info};
use shared::{ParticipantId, SessionId, SessionMode};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Waiting players, paired newest-first: the most recently queued participant
/// is popped as the opponent for the next arrival.
#[derive(Debug, Clone, Default)]
pub struct QuickMatchQueue {
    waiting: Vec<ParticipantId>,
}

impl QuickMatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs the caller with the most recently queued participant, or
    /// enqueues the caller when nobody is waiting. Calling again while
    /// already queued is a no-op.
    pub fn try_match(&mut self, participant: ParticipantId) -> Option<ParticipantId> {
        if self.waiting.contains(&participant) {
            debug!("Participant {} is already waiting for a match", participant);
            return None;
        }
        match self.waiting.pop() {
            Some(opponent) => Some(opponent),
            None => {
                self.waiting.push(participant);
                None
            }
        }
    }

    /// Drops a waiting participant (disconnect or cancel).
    pub fn remove(&mut self, participant: ParticipantId) {
        self.waiting.retain(|&waiting| waiting != participant);
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

/// Turns queue hits into live sessions.
pub struct QuickMatch {
    registry: Arc<SessionRegistry>,
    queue: Mutex<QuickMatchQueue>,
}

impl QuickMatch {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            queue: Mutex::new(QuickMatchQueue::new()),
        }
    }

    /// Requests a pvp match. Returns the new session id when an opponent was
    /// waiting, `None` when the caller was queued instead.
    pub async fn request(&self, participant: ParticipantId) -> Option<SessionId> {
        let opponent = self.queue.lock().await.try_match(participant)?;
        let session_id = self
            .registry
            .create(opponent, participant, SessionMode::Pvp)
            .await;
        info!(
            "Quick match: session {} pairs {} vs {}",
            session_id, opponent, participant
        );
        Some(session_id)
    }

    /// Starts a match against the computer opponent immediately; `computer`
    /// is the reserved participant id the AI module sends moves under.
    pub async fn request_vs_computer(
        &self,
        participant: ParticipantId,
        computer: ParticipantId,
    ) -> SessionId {
        self.registry
            .create(participant, computer, SessionMode::Pvc)
            .await
    }

    /// Drops a waiting participant from the queue.
    pub async fn cancel(&self, participant: ParticipantId) {
        self.queue.lock().await.remove(participant);
    }
}
