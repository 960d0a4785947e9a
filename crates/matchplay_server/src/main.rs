//! Matchplay - Unified CLI
//!
//! Runs the session manager behind a console transport, or prints the
//! leaderboard.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use matchplay_server::{
    Console, Dispatcher, IdleReaper, MemoryScoreStore, OutputFormat, PresenceTracker, ScoreStore,
    ServerConfig, SessionRegistry, SqliteScoreStore,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the channel carrying reaper notices to the console.
const BACKGROUND_NOTICES: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Console {
            db,
            idle_timeout,
            predictor,
            json,
            memory,
        } => {
            let mut config = config;
            if let Some(db) = db {
                config = config.with_database_path(db);
            }
            if let Some(secs) = idle_timeout {
                config = config.with_idle_timeout_secs(secs);
            }
            if let Some(predictor) = predictor {
                config = config.with_predictor(predictor);
            }
            config.validate()?;
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            run_console(config, format, memory).await
        }
        Command::Leaders { db, limit } => {
            let config = match db {
                Some(db) => config.with_database_path(db),
                None => config,
            };
            print_leaders(&config, limit.unwrap_or(*config.leaderboard_size())).await
        }
    }
}

/// Run the console transport until stdin closes or Ctrl-C.
#[instrument(skip(config), fields(database = %config.database_path()))]
async fn run_console(config: ServerConfig, format: OutputFormat, memory: bool) -> Result<()> {
    let store: Arc<dyn ScoreStore> = if memory {
        info!("Keeping scores in memory");
        Arc::new(MemoryScoreStore::new())
    } else {
        Arc::new(SqliteScoreStore::open(config.database_path())?)
    };

    let tracker = PresenceTracker::new(Arc::clone(&store));
    let registry = SessionRegistry::new();
    let dispatcher = Dispatcher::new(
        tracker.clone(),
        registry.clone(),
        store,
        config.predictor().build(),
        *config.leaderboard_size(),
    );

    let (notice_tx, notice_rx) = mpsc::channel(BACKGROUND_NOTICES);
    let shutdown = CancellationToken::new();
    let reaper = IdleReaper::new(tracker, registry, config.idle_timeout())
        .with_interval(config.sweep_interval())
        .with_notices(notice_tx)
        .spawn(shutdown.clone());

    info!(
        predictor = %config.predictor(),
        idle_timeout_secs = config.idle_timeout_secs(),
        "Matchplay console ready"
    );

    let console = Console::new(dispatcher, format);
    let outcome = tokio::select! {
        result = console.run(tokio::io::stdin(), tokio::io::stdout(), notice_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    shutdown.cancel();
    if let Err(e) = reaper.await {
        warn!(error = %e, "Idle reaper task failed");
    }
    outcome?;
    Ok(())
}

/// Print the leaderboard from the configured database.
#[instrument(skip(config), fields(database = %config.database_path()))]
async fn print_leaders(config: &ServerConfig, limit: usize) -> Result<()> {
    let store = SqliteScoreStore::open(config.database_path())?;
    let leaders = store.leaders(limit).await?;
    if leaders.is_empty() {
        println!("No players yet.");
        return Ok(());
    }

    for (place, entry) in leaders.iter().enumerate() {
        let card = entry.card();
        println!(
            "{:>2}. {:<20} {:>4}  {}W {}L {}D",
            place + 1,
            entry.display_name(),
            card.win_rate_label(),
            card.wins(),
            card.losses(),
            card.draws()
        );
    }
    Ok(())
}
