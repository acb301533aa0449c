use clap::Parser;
use log::info;
use server::clock::{Clock, SystemClock};
use server::orchestrator::{TournamentOrchestrator, TournamentSettings};
use server::outbound::{LogNotifier, LogSink, Notifier, StateSink};
use server::registry::{SessionRegistry, SessionSettings};
use server::store::{MatchStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, wires the engine's services together, and
/// runs them until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Session tick rate (updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
        /// Distance the simulation advances per tick, in field units
        #[clap(long, default_value = "0.5")]
        frame_step: f32,
        /// Points needed to win a match
        #[clap(short, long, default_value = "15")]
        win_score: u32,
        /// Participants needed before tournament matchmaking begins
        #[clap(long, default_value = "3")]
        min_participants: usize,
        /// Seconds before an incomplete tournament is forced to finish
        #[clap(long, default_value = "900")]
        tournament_expiry: u64,
        /// Seconds between tournament lifecycle polls
        #[clap(long, default_value = "60")]
        poll_period: u64,
    }

    env_logger::init();
    let args = Args::parse();

    let session_settings = SessionSettings {
        tick_interval: Duration::from_secs_f32(1.0 / args.tick_rate as f32),
        frame_step: args.frame_step,
        win_score: args.win_score,
    };
    let tournament_settings = TournamentSettings {
        min_participants: args.min_participants,
        expiry: Duration::from_secs(args.tournament_expiry),
        poll_period: Duration::from_secs(args.poll_period),
    };

    // External collaborators; transport adapters swap in their own.
    let store: Arc<dyn MatchStore> = Arc::new(MemoryStore::new());
    let sink: Arc<dyn StateSink> = Arc::new(LogSink);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (registry, mut outcome_rx) = SessionRegistry::new(session_settings, sink);
    let orchestrator = TournamentOrchestrator::new(
        Arc::clone(&registry),
        store,
        notifier,
        clock,
        tournament_settings,
    );

    orchestrator.reconcile_from_store().await;

    // Feed finished sessions back into ratings, pairing history, and the store.
    let outcome_task = {
        let registry = Arc::clone(&registry);
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            while let Some(outcome) = outcome_rx.recv().await {
                registry.retire(outcome.session_id).await;
                orchestrator.handle_session_outcome(&outcome).await;
            }
        })
    };

    let poll_task = tokio::spawn(Arc::clone(&orchestrator).run());

    info!(
        "Match engine running ({} Hz sessions, {}s tournament poll)",
        args.tick_rate, args.poll_period
    );

    // Handle shutdown gracefully
    tokio::select! {
        result = outcome_task => {
            if let Err(e) = result {
                eprintln!("Outcome task panicked: {}", e);
            }
        }
        result = poll_task => {
            if let Err(e) = result {
                eprintln!("Tournament poll task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
