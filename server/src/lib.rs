//! # Match Orchestration & Real-Time Session Engine
//!
//! This library hosts the authoritative side of a Pong-style game platform:
//! many concurrent match sessions plus the meta-layer that organizes players
//! into them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each live match is a [`session::Session`]: two paddles, a ball, and a
//! score pair advanced by a fixed-step integrator with exact collision-time
//! resolution. The session is the single source of truth; clients only send
//! move commands and receive state.
//!
//! ### Session Ownership
//! The [`registry::SessionRegistry`] owns every live session and drives each
//! one on its own timer task. Sessions never block each other: move commands
//! are queued per session and applied by that session's task, atomically
//! with respect to its own ticks.
//!
//! ### Matchmaking
//! Quick one-off matches pair through [`matchmaking::QuickMatch`] (newest
//! waiting player first). Tournaments run round-robin pairing through the
//! [`orchestrator::TournamentOrchestrator`], which polls the lifecycle on a
//! fixed period: lobby registration, one invitation handshake per tick,
//! rating accrual, and expiry-forced completion.
//!
//! ### Crash Recovery
//! Tournament progress is persisted as match rows in an external store. At
//! startup the orchestrator replays those rows to rebuild the participant
//! pool, ratings, and the played-pair graph, then resumes matchmaking where
//! the previous process stopped.
//!
//! ## External Collaborators
//!
//! Identity, persistence, transport, and messaging stay outside this crate,
//! behind the [`store::MatchStore`], [`outbound::StateSink`], and
//! [`outbound::Notifier`] traits. Everything is constructed explicitly and
//! injected; nothing in here is a global.

pub mod clock;
pub mod invitations;
pub mod match_graph;
pub mod matchmaking;
pub mod orchestrator;
pub mod outbound;
pub mod rating;
pub mod registry;
pub mod session;
pub mod store;
pub mod tournament;
