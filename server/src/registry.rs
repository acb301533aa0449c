//! Owns the set of live sessions and drives each one's tick loop.
//!
//! Every session gets its own spawned task, which is the sole writer of that
//! session's state: inbound move commands are queued through a channel and
//! applied by the task itself, atomically with respect to its own ticks. The
//! registry's id map is the only shared structure, guarded by a coarse lock
//! around creation, removal, and lookup; tick bodies never touch it.

use crate::outbound::StateSink;
use crate::session::Session;
use log::{debug, info, warn};
use shared::{MoveCommand, ParticipantId, SessionId, SessionMode, WIN_SCORE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Tick loop settings shared by every session the registry creates.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Wall-clock period between ticks.
    pub tick_interval: Duration,
    /// Distance the simulation advances per tick, in field units.
    pub frame_step: f32,
    pub win_score: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(33),
            frame_step: 0.5,
            win_score: WIN_SCORE,
        }
    }
}

/// Commands applied by a session's own task.
#[derive(Debug)]
enum SessionCommand {
    Move { participant: ParticipantId, step: i8 },
    Stop,
}

/// Emitted on the registry's outcome channel once a session finishes on its
/// own (win score reached or force-finished on corrupt state). Sessions torn
/// down through `remove` do not report an outcome.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub participants: (ParticipantId, ParticipantId),
    pub score: (u32, u32),
}

struct SessionHandle {
    participants: (ParticipantId, ParticipantId),
    mode: SessionMode,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

struct RegistryInner {
    sessions: HashMap<SessionId, SessionHandle>,
    next_session_id: SessionId,
}

/// Process-wide session registry. Session ids are allocated from a monotonic
/// counter and never reused within the registry's lifetime.
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    sink: Arc<dyn StateSink>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
    settings: SessionSettings,
}

impl SessionRegistry {
    /// Creates the registry and returns the channel on which finished
    /// sessions report their outcomes.
    pub fn new(
        settings: SessionSettings,
        sink: Arc<dyn StateSink>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            inner: RwLock::new(RegistryInner {
                sessions: HashMap::new(),
                next_session_id: 1,
            }),
            sink,
            outcome_tx,
            settings,
        });
        (registry, outcome_rx)
    }

    /// Allocates a session for the pair and spawns its tick task.
    pub async fn create(
        &self,
        participant_a: ParticipantId,
        participant_b: ParticipantId,
        mode: SessionMode,
    ) -> SessionId {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;

        let session_id = inner.next_session_id;
        inner.next_session_id += 1;

        let session = Session::new(
            session_id,
            mode,
            participant_a,
            participant_b,
            self.settings.win_score,
        );
        let task = tokio::spawn(run_session(
            session,
            command_rx,
            Arc::clone(&self.sink),
            self.outcome_tx.clone(),
            self.settings,
        ));

        info!(
            "Session {} created ({:?}, {} vs {})",
            session_id, mode, participant_a, participant_b
        );
        inner.sessions.insert(
            session_id,
            SessionHandle {
                participants: (participant_a, participant_b),
                mode,
                command_tx,
                task,
            },
        );
        session_id
    }

    /// Routes an inbound move command to the matching session. Commands for
    /// unknown sessions are dropped.
    pub async fn apply_move(&self, session_id: SessionId, participant: ParticipantId, step: i8) {
        let inner = self.inner.read().await;
        match inner.sessions.get(&session_id) {
            Some(handle) => {
                let _ = handle
                    .command_tx
                    .send(SessionCommand::Move { participant, step });
            }
            None => debug!("Move for unknown session {}", session_id),
        }
    }

    /// Routes a decoded inbound move command.
    pub async fn apply_command(&self, command: MoveCommand) {
        self.apply_move(command.session_id, command.participant, command.step)
            .await;
    }

    /// Explicit termination (e.g. a disconnect): stops the tick task and
    /// forgets the session whether or not it had finished.
    pub async fn remove(&self, session_id: SessionId) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(handle) = inner.sessions.remove(&session_id) {
            if handle.command_tx.send(SessionCommand::Stop).is_err() {
                // Task already gone; make sure it is not left running.
                handle.task.abort();
            }
            info!("Session {} removed", session_id);
            true
        } else {
            false
        }
    }

    /// Forgets a session whose task has already finished and pushed its
    /// final state. Called by the outcome consumer.
    pub async fn retire(&self, session_id: SessionId) -> bool {
        self.inner.write().await.sessions.remove(&session_id).is_some()
    }

    pub async fn contains(&self, session_id: SessionId) -> bool {
        self.inner.read().await.sessions.contains_key(&session_id)
    }

    pub async fn participants_of(
        &self,
        session_id: SessionId,
    ) -> Option<(ParticipantId, ParticipantId)> {
        self.inner
            .read()
            .await
            .sessions
            .get(&session_id)
            .map(|handle| handle.participants)
    }

    pub async fn mode_of(&self, session_id: SessionId) -> Option<SessionMode> {
        self.inner
            .read()
            .await
            .sessions
            .get(&session_id)
            .map(|handle| handle.mode)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// One session's tick loop: the only writer of that session's state.
async fn run_session(
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    sink: Arc<dyn StateSink>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
    settings: SessionSettings,
) {
    let mut ticker = interval(settings.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (participant_a, participant_b) = session.participants();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Move { participant, step }) => {
                    session.apply_move(participant, step);
                }
                Some(SessionCommand::Stop) | None => {
                    debug!("Session {} stopped", session.id());
                    return;
                }
            },
            _ = ticker.tick() => {
                session.tick(settings.frame_step);
                for participant in [participant_a, participant_b] {
                    if let Some(update) = session.state_for(participant) {
                        sink.dispatch(participant, &update);
                    }
                }
                if session.is_finished() {
                    for participant in [participant_a, participant_b] {
                        if let Some(update) = session.result_for(participant) {
                            sink.dispatch(participant, &update);
                        }
                    }
                    let outcome = SessionOutcome {
                        session_id: session.id(),
                        mode: session.mode(),
                        participants: (participant_a, participant_b),
                        score: session.score(),
                    };
                    if outcome_tx.send(outcome).is_err() {
                        warn!("Session {}: no outcome listener", session.id());
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::RecordingSink;
    use shared::Update;
    use tokio::time::timeout;

    fn fast_settings() -> SessionSettings {
        SessionSettings {
            tick_interval: Duration::from_millis(2),
            frame_step: 5.0,
            win_score: 1,
        }
    }

    #[tokio::test]
    async fn test_session_runs_to_completion_and_reports_outcome() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, mut outcome_rx) =
            SessionRegistry::new(fast_settings(), Arc::clone(&sink) as Arc<dyn StateSink>);

        let session_id = registry.create(1, 2, SessionMode::Pvp).await;
        assert!(registry.contains(session_id).await);

        let outcome = timeout(Duration::from_secs(10), outcome_rx.recv())
            .await
            .expect("session should finish in time")
            .expect("outcome channel open");

        assert_eq!(outcome.session_id, session_id);
        assert_eq!(outcome.mode, SessionMode::Pvp);
        assert_eq!(outcome.participants, (1, 2));
        assert!(outcome.score.0.max(outcome.score.1) >= 1);

        // The handle stays until the outcome consumer retires it.
        assert!(registry.contains(session_id).await);
        assert!(registry.retire(session_id).await);
        assert!(!registry.contains(session_id).await);

        let updates = sink.take();
        let finished_updates = updates
            .iter()
            .filter(|(_, update)| matches!(update, Update::Finished { .. }))
            .count();
        assert_eq!(finished_updates, 2);
        assert!(updates
            .iter()
            .any(|(_, update)| matches!(update, Update::State { .. })));
    }

    #[tokio::test]
    async fn test_remove_stops_and_forgets_session() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, _outcome_rx) = SessionRegistry::new(
            SessionSettings {
                win_score: 1000,
                ..fast_settings()
            },
            sink as Arc<dyn StateSink>,
        );

        let session_id = registry.create(1, 2, SessionMode::Pvp).await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(session_id).await);
        assert!(registry.is_empty().await);

        // Removing again is a harmless no-op.
        assert!(!registry.remove(session_id).await);
    }

    #[tokio::test]
    async fn test_moves_route_to_live_session_and_unknown_ids_are_dropped() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, _outcome_rx) = SessionRegistry::new(
            SessionSettings {
                win_score: 1000,
                frame_step: 0.0,
                ..fast_settings()
            },
            Arc::clone(&sink) as Arc<dyn StateSink>,
        );

        let session_id = registry.create(1, 2, SessionMode::Pvp).await;
        registry
            .apply_command(MoveCommand {
                session_id,
                participant: 1,
                step: 1,
            })
            .await;
        registry.apply_move(9999, 1, 1).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        let moved = sink.take().iter().any(|(participant, update)| {
            *participant == 1
                && matches!(
                    update,
                    Update::State { own_paddle, .. } if own_paddle.destination.lateral > 0.0
                )
        });
        assert!(moved);

        registry.remove(session_id).await;
    }

    #[tokio::test]
    async fn test_session_ids_are_not_reused() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, _outcome_rx) = SessionRegistry::new(
            SessionSettings {
                win_score: 1000,
                ..fast_settings()
            },
            sink as Arc<dyn StateSink>,
        );

        let first = registry.create(1, 2, SessionMode::Pvp).await;
        registry.remove(first).await;
        let second = registry.create(3, 4, SessionMode::Pvc).await;

        assert_ne!(first, second);
        assert_eq!(registry.mode_of(second).await, Some(SessionMode::Pvc));
        assert_eq!(registry.participants_of(second).await, Some((3, 4)));

        registry.remove(second).await;
    }
}
