//! One-shot question answering

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use finch_core::ai::{Gateway, GatewayConfig, LlmClient};
use finch_core::{ChatPipeline, LlmBackend};

use super::core::open_db;

pub async fn cmd_ask(
    db_path: &Path,
    user: &str,
    question: &str,
    now: Option<NaiveDate>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let gateway = LlmClient::from_env().map(|client| {
        println!("🤖 LLM backend: {} ({})", client.host(), client.model());
        Gateway::new(client, GatewayConfig::default())
    });
    if gateway.is_none() {
        println!("💡 Tip: set OLLAMA_HOST for conversational answers; using templated answers");
    }

    let pipeline = ChatPipeline::new(db, gateway).context("Failed to build pipeline")?;
    let now = now.unwrap_or_else(|| Utc::now().date_naive());

    let outcome = pipeline.answer(user, question, now).await?;

    println!();
    println!("{}", outcome.answer);
    println!();
    println!(
        "   (source: {}, reconciled: {}, {} transactions considered)",
        outcome.source.as_str(),
        outcome.reconciled,
        outcome.aggregation.transaction_count
    );

    Ok(())
}
