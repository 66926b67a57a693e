//! Web server command

use std::path::Path;

use anyhow::{Context, Result};
use finch_core::ai::{Gateway, GatewayConfig, LlmClient};
use finch_core::Rules;
use finch_server::ServerConfig;

use super::core::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    rules_path: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let gateway = LlmClient::from_env().map(|client| Gateway::new(client, GatewayConfig::default()));
    let rules = Rules::load(rules_path).context("Failed to load gamification rules")?;

    println!("🚀 Starting Finch API on {}:{}", host, port);
    println!("   Achievements in catalog: {}", rules.achievements.len());

    finch_server::serve(db, gateway, rules, host, port, ServerConfig::default()).await
}
