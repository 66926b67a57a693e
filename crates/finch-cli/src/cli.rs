//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Finch - grounded financial chatbot backend
#[derive(Parser)]
#[command(name = "finch")]
#[command(about = "Self-hosted financial chatbot with a verified-numbers pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finch.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINCH_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Seed a user's ledger from a transactions CSV
    Seed {
        /// CSV file (date,amount,category,description)
        #[arg(short, long)]
        file: PathBuf,

        /// User to seed
        #[arg(short, long)]
        user: String,
    },

    /// Ask a financial question
    Ask {
        /// User asking the question
        #[arg(short, long)]
        user: String,

        /// The question text
        question: String,

        /// Reference date for relative time expressions (defaults to today)
        #[arg(long)]
        now: Option<chrono::NaiveDate>,
    },

    /// Ingest an XP event
    Award {
        /// User receiving the XP
        #[arg(short, long)]
        user: String,

        /// Idempotency key for the event
        #[arg(long)]
        event_id: String,

        /// Action kind (expense_logged, goal_reached, streak_kept, budget_blown, ...)
        #[arg(long, default_value = "expense_logged")]
        action: String,

        /// Signed XP delta (negative = penalty)
        #[arg(long)]
        xp: i64,
    },

    /// Show a user's gamification state
    Status {
        /// User to inspect
        #[arg(short, long)]
        user: String,

        /// Rebuild the state from the event log instead of the snapshot
        #[arg(long)]
        rebuild: bool,
    },

    /// Retry queued XP ingestions
    RetryPending,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Gamification rules file (TOML); built-in defaults when absent
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}
