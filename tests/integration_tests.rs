//! Integration tests for the match orchestration engine
//!
//! These tests validate cross-component flows: wire message round-trips,
//! quick matchmaking into live sessions, and the full tournament lifecycle
//! including crash recovery from the persisted store.

use server::clock::{Clock, ManualClock};
use server::matchmaking::QuickMatch;
use server::orchestrator::{TournamentOrchestrator, TournamentSettings};
use server::outbound::{Notifier, RecordingNotifier, RecordingSink, StateSink, TournamentEvent};
use server::registry::{SessionOutcome, SessionRegistry, SessionSettings};
use server::store::{MatchStore, MemoryStore};
use server::tournament::TournamentPhase;
use shared::{MatchOutcome, SessionMode, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn fast_session_settings() -> SessionSettings {
    SessionSettings {
        tick_interval: Duration::from_millis(2),
        frame_step: 5.0,
        win_score: 1,
    }
}

/// WIRE MESSAGE TESTS
mod wire_tests {
    use super::*;

    /// Tests update serialization round-trip for outbound broadcasting
    #[test]
    fn update_serialization_roundtrip() {
        let updates = vec![
            Update::State {
                session_id: 1,
                own_paddle: shared::PaddleState::new(1, -shared::PADDLE_PLANE),
                opponent_paddle: shared::PaddleState::new(2, shared::PADDLE_PLANE),
                ball: shared::BallState::new(shared::Vec3::new(0.6, 0.0, 0.8)),
            },
            Update::Finished {
                session_id: 1,
                outcome: MatchOutcome::Lost,
                own_score: 9,
                opponent_score: 15,
            },
        ];

        for update in updates {
            let serialized = bincode::serialize(&update).unwrap();
            let deserialized: Update = bincode::deserialize(&serialized).unwrap();

            match (&update, &deserialized) {
                (Update::State { .. }, Update::State { .. }) => {}
                (Update::Finished { .. }, Update::Finished { .. }) => {}
                _ => panic!("Update type mismatch after serialization"),
            }
        }
    }
}

/// QUICK MATCHMAKING TESTS
mod quick_match_tests {
    use super::*;

    /// Tests the queue-then-pair flow through to a finished session
    #[tokio::test]
    async fn quick_match_pairs_and_runs_to_completion() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, mut outcome_rx) = SessionRegistry::new(
            fast_session_settings(),
            Arc::clone(&sink) as Arc<dyn StateSink>,
        );
        let quick_match = QuickMatch::new(Arc::clone(&registry));

        assert_eq!(quick_match.request(1).await, None);
        let session_id = quick_match.request(2).await.expect("pairing expected");
        assert_eq!(registry.participants_of(session_id).await, Some((1, 2)));

        let outcome = timeout(Duration::from_secs(10), outcome_rx.recv())
            .await
            .expect("session should finish in time")
            .expect("outcome channel open");

        assert_eq!(outcome.session_id, session_id);
        assert_eq!(outcome.mode, SessionMode::Pvp);
        assert!(outcome.score.0.max(outcome.score.1) >= 1);

        assert!(registry.retire(session_id).await);
        assert!(registry.is_empty().await);

        // Both participants saw per-tick state and a terminal result.
        let updates = sink.take();
        for participant in [1, 2] {
            assert!(updates.iter().any(|(p, update)| {
                *p == participant && matches!(update, Update::State { .. })
            }));
            assert!(updates.iter().any(|(p, update)| {
                *p == participant && matches!(update, Update::Finished { .. })
            }));
        }
    }

    /// Tests that a cancelled waiter is not paired afterwards
    #[tokio::test]
    async fn cancelled_waiter_is_not_paired() {
        let sink = Arc::new(RecordingSink::new());
        let (registry, _outcome_rx) =
            SessionRegistry::new(fast_session_settings(), sink as Arc<dyn StateSink>);
        let quick_match = QuickMatch::new(Arc::clone(&registry));

        assert_eq!(quick_match.request(1).await, None);
        quick_match.cancel(1).await;

        assert_eq!(quick_match.request(2).await, None);
        assert!(registry.is_empty().await);
    }
}

/// TOURNAMENT LIFECYCLE TESTS
mod tournament_tests {
    use super::*;

    struct Stack {
        registry: Arc<SessionRegistry>,
        orchestrator: Arc<TournamentOrchestrator>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
        outcome_rx: tokio::sync::mpsc::UnboundedReceiver<SessionOutcome>,
    }

    fn stack(store: Arc<dyn MatchStore>) -> Stack {
        let sink = Arc::new(RecordingSink::new());
        let (registry, outcome_rx) =
            SessionRegistry::new(fast_session_settings(), sink as Arc<dyn StateSink>);
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new());
        let orchestrator = TournamentOrchestrator::new(
            Arc::clone(&registry),
            store,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            TournamentSettings::default(),
        );
        Stack {
            registry,
            orchestrator,
            notifier,
            clock,
            outcome_rx,
        }
    }

    /// Drives one full round-robin over three participants with real
    /// sessions: poll pairs them, both sides accept, the session runs to its
    /// win score, and the outcome feeds back the way the binary wires it.
    #[tokio::test]
    async fn full_round_robin_reaches_finished() {
        let store = Arc::new(MemoryStore::new());
        let mut stack = stack(Arc::clone(&store) as Arc<dyn MatchStore>);
        stack.orchestrator.reconcile_from_store().await;

        for participant in 1..=3 {
            assert!(stack.orchestrator.register_participant(participant).await);
        }
        stack.orchestrator.poll().await;
        assert_eq!(
            stack.orchestrator.phase().await,
            TournamentPhase::Matchmaking
        );

        for _ in 0..3 {
            stack.orchestrator.poll().await;
            let offered: Vec<_> = stack
                .notifier
                .take()
                .into_iter()
                .filter_map(|(participant, event)| match event {
                    TournamentEvent::InviteOffered { .. } => Some(participant),
                    _ => None,
                })
                .collect();
            assert_eq!(offered.len(), 2);

            assert_eq!(
                stack
                    .orchestrator
                    .handle_invitation_response(offered[0], true)
                    .await,
                None
            );
            let session_id = stack
                .orchestrator
                .handle_invitation_response(offered[1], true)
                .await
                .expect("both accepted");
            assert_eq!(
                stack.registry.mode_of(session_id).await,
                Some(SessionMode::Tournament)
            );

            let outcome = timeout(Duration::from_secs(10), stack.outcome_rx.recv())
                .await
                .expect("session should finish in time")
                .expect("outcome channel open");
            stack.registry.retire(outcome.session_id).await;
            stack.orchestrator.handle_session_outcome(&outcome).await;
        }

        stack.orchestrator.poll().await;
        assert_eq!(stack.orchestrator.phase().await, TournamentPhase::Finished);
        assert_eq!(store.active_tournament().unwrap(), None);
        // Three matches, two rows each.
        assert_eq!(store.rows().len(), 6);

        // The cycle re-arms with a fresh lobby.
        stack.orchestrator.poll().await;
        assert_eq!(stack.orchestrator.phase().await, TournamentPhase::Lobby);
        assert_ne!(stack.orchestrator.tournament_id().await, 1);
    }

    /// Tests that the expiry bound finishes a stalled tournament
    #[tokio::test]
    async fn stalled_tournament_expires() {
        let store = Arc::new(MemoryStore::new());
        let stack = stack(store as Arc<dyn MatchStore>);
        stack.orchestrator.reconcile_from_store().await;

        for participant in 1..=3 {
            stack.orchestrator.register_participant(participant).await;
        }
        stack.orchestrator.poll().await;
        stack.notifier.take();

        stack.clock.advance(Duration::from_secs(15 * 60 + 1));
        stack.orchestrator.poll().await;

        assert_eq!(stack.orchestrator.phase().await, TournamentPhase::Finished);
        assert!(stack.notifier.take().iter().any(|(_, event)| {
            matches!(event, TournamentEvent::TournamentCancelled { .. })
        }));
    }

    /// Tests restart recovery: a second orchestrator over the same store
    /// resumes the tournament with a symmetric played-pair graph.
    #[tokio::test]
    async fn restart_resumes_persisted_tournament() {
        let store = Arc::new(MemoryStore::new());

        // First process: play one tournament match, then "crash".
        {
            let stack = stack(Arc::clone(&store) as Arc<dyn MatchStore>);
            stack.orchestrator.reconcile_from_store().await;
            for participant in 1..=3 {
                stack.orchestrator.register_participant(participant).await;
            }
            stack.orchestrator.poll().await;
            stack
                .orchestrator
                .handle_session_outcome(&SessionOutcome {
                    session_id: 99,
                    mode: SessionMode::Tournament,
                    participants: (1, 2),
                    score: (15, 7),
                })
                .await;
        }

        // Second process reconciles from the rows alone.
        let stack = stack(Arc::clone(&store) as Arc<dyn MatchStore>);
        stack.orchestrator.reconcile_from_store().await;

        assert_eq!(
            stack.orchestrator.phase().await,
            TournamentPhase::Matchmaking
        );
        assert_eq!(stack.orchestrator.participant_count().await, 2);
        assert!(stack.orchestrator.have_played(1, 2).await);
        assert!(stack.orchestrator.have_played(2, 1).await);
        assert_eq!(stack.orchestrator.rating(1).await, 8);
        assert_eq!(stack.orchestrator.rating(2).await, -8);
    }
}
