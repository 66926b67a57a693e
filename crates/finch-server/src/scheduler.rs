//! Background task scheduler for pending XP event retries
//!
//! Failed gamification ingestions are queued, never dropped; this scheduler
//! drains the queue in the background so they are retried asynchronously.
//!
//! Configuration via environment variables:
//! - `FINCH_RETRY_INTERVAL`: Interval in seconds (default: 60, "0" disables)

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::AppState;

/// Configuration for the pending-event retry scheduler
#[derive(Debug, Clone)]
pub struct RetryScheduleConfig {
    /// Interval between retry sweeps in seconds
    pub interval_secs: u64,
    /// Pending events drained per sweep
    pub batch_size: i64,
}

impl RetryScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None when retries are explicitly disabled
    /// (FINCH_RETRY_INTERVAL=0).
    pub fn from_env() -> Option<Self> {
        let interval_secs: u64 = std::env::var("FINCH_RETRY_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        if interval_secs == 0 {
            warn!("FINCH_RETRY_INTERVAL is 0, background retries disabled");
            return None;
        }

        Some(Self {
            interval_secs,
            batch_size: 100,
        })
    }
}

/// Start the retry scheduler as a background task
///
/// Spawns a tokio task that runs indefinitely, draining the pending XP
/// event queue at the configured interval.
pub fn start_retry_scheduler(state: Arc<AppState>, config: RetryScheduleConfig) {
    info!(
        "Starting XP retry scheduler: every {} seconds",
        config.interval_secs
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_secs));

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match state.engine.retry_pending(config.batch_size).await {
                Ok(outcome) if outcome.retried > 0 => {
                    info!(
                        retried = outcome.retried,
                        succeeded = outcome.succeeded,
                        dropped = outcome.dropped,
                        "Retried pending XP events"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Pending XP event retry sweep failed: {}", e);
                }
            }
        }
    });
}
