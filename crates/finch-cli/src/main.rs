//! Finch CLI - grounded financial chatbot backend
//!
//! Usage:
//!   finch init                          Initialize database
//!   finch seed --file txns.csv --user alice
//!   finch ask --user alice "How much did I spend last month?"
//!   finch award --user alice --event-id e1 --xp 50
//!   finch serve --port 3000             Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Seed { file, user } => {
            commands::cmd_seed(&cli.db, &file, &user, cli.no_encrypt)
        }
        Commands::Ask { user, question, now } => {
            commands::cmd_ask(&cli.db, &user, &question, now, cli.no_encrypt).await
        }
        Commands::Award {
            user,
            event_id,
            action,
            xp,
        } => commands::cmd_award(&cli.db, &user, &event_id, &action, xp, cli.no_encrypt).await,
        Commands::Status { user, rebuild } => {
            commands::cmd_status(&cli.db, &user, rebuild, cli.no_encrypt)
        }
        Commands::RetryPending => commands::cmd_retry_pending(&cli.db, cli.no_encrypt).await,
        Commands::Serve { port, host, rules } => {
            commands::cmd_serve(&cli.db, &host, port, rules.as_deref(), cli.no_encrypt).await
        }
    }
}
