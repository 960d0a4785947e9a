//! Command-line interface for matchplay.

use matchplay_server::PredictorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Matchplay - turn-based game sessions between remote participants
#[derive(Parser, Debug)]
#[command(name = "matchplay")]
#[command(about = "Session manager and rules engine for turn-based matches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./matchplay.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play over stdin/stdout: each line is `<participant> <command...>`
    Console {
        /// Path to the database file (created if it doesn't exist)
        #[arg(long)]
        db: Option<String>,

        /// Seconds of inactivity before a participant is evicted
        #[arg(long)]
        idle_timeout: Option<u64>,

        /// Automated opponent strategy
        #[arg(long, value_enum)]
        predictor: Option<PredictorKind>,

        /// Write notices as JSON lines
        #[arg(long)]
        json: bool,

        /// Keep scores in memory instead of a database
        #[arg(long, conflicts_with = "db")]
        memory: bool,
    },

    /// Print the leaderboard
    Leaders {
        /// Path to the database file
        #[arg(long)]
        db: Option<String>,

        /// Number of rows to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}
