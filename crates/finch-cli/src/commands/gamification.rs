//! XP commands: award, status, retry-pending

use std::path::Path;

use anyhow::{Context, Result};
use finch_core::models::{ActionKind, XPEvent};
use finch_core::{GamificationEngine, Rules};

use super::core::open_db;

pub async fn cmd_award(
    db_path: &Path,
    user: &str,
    event_id: &str,
    action: &str,
    xp: i64,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let engine = GamificationEngine::new(db, Rules::default());

    let action: ActionKind = action
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Bad action kind")?;

    let event = XPEvent {
        event_id: event_id.to_string(),
        user_id: user.to_string(),
        action,
        xp_delta: xp,
    };

    let state = engine.ingest(&event).await?;

    println!("✅ Event {} applied", event_id);
    print_state(&state);
    Ok(())
}

pub fn cmd_status(db_path: &Path, user: &str, rebuild: bool, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let engine = GamificationEngine::new(db, Rules::default());

    let state = if rebuild {
        println!("🔁 Rebuilding state from the event log...");
        engine.rebuild_state(user)?
    } else {
        engine.current_state(user)?
    };

    print_state(&state);
    Ok(())
}

pub async fn cmd_retry_pending(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let engine = GamificationEngine::new(db, Rules::default());

    let outcome = engine.retry_pending(100).await?;

    println!("🔁 Retried {} pending events", outcome.retried);
    println!("   Succeeded: {}", outcome.succeeded);
    println!("   Dropped (unknown user): {}", outcome.dropped);
    let remaining = outcome.retried - outcome.succeeded - outcome.dropped;
    if remaining > 0 {
        println!("   Still pending: {}", remaining);
    }
    Ok(())
}

fn print_state(state: &finch_core::models::GamificationState) {
    println!();
    println!("📊 {} - level {} ({} XP)", state.user_id, state.level, state.total_xp);
    if state.unlocked.is_empty() {
        println!("   No achievements yet");
    } else {
        println!("   Achievements: {}", state.unlocked.iter().cloned().collect::<Vec<_>>().join(", "));
    }
}
