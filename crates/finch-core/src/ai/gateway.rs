//! LLM gateway: bounded timeout, bounded retries, jittered backoff
//!
//! One external network call per attempt, no local state mutation. The
//! returned future is cancellable: dropping it (e.g. when a caller deadline
//! fires) aborts the in-flight attempt cleanly, since the query path never
//! mutates state.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::prompt::ComposedPrompt;

use super::{LlmBackend, LlmClient};

/// Gateway retry/timeout configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt (transient failures only)
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per attempt
    pub base_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// LLM-call budget: concurrent in-flight calls across all requests
    pub max_concurrent: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            max_concurrent: 4,
        }
    }
}

/// A successful gateway reply
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub text: String,
    pub model: String,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Retrying wrapper around an LLM client
#[derive(Clone)]
pub struct Gateway {
    client: LlmClient,
    config: GatewayConfig,
    /// Shared across clones so the call budget is process-wide
    permits: Arc<Semaphore>,
}

impl Gateway {
    pub fn new(client: LlmClient, config: GatewayConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            client,
            config,
            permits,
        }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn host(&self) -> &str {
        self.client.host()
    }

    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// Total attempts a single ask() may make
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries + 1
    }

    /// Ask the backend, retrying transient failures up to the configured
    /// bound. Non-retryable failures (4xx-equivalent: invalid prompt, quota)
    /// fail immediately. Exhausted retries yield `GatewayFailure` carrying
    /// the last error; callers fall back to the templated answer.
    pub async fn ask(&self, prompt: &ComposedPrompt) -> Result<GatewayReply> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::GatewayFailure("gateway shut down".into()))?;

        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries + 1 {
            if attempt > 1 {
                let delay = self.backoff_delay(attempt - 1);
                debug!(attempt, ?delay, "Retrying LLM call after backoff");
                tokio::time::sleep(delay).await;
            }

            match timeout(self.config.timeout, self.client.answer(prompt)).await {
                Ok(Ok(text)) => {
                    return Ok(GatewayReply {
                        text,
                        model: self.client.model().to_string(),
                        attempts: attempt,
                    });
                }
                Ok(Err(err)) if is_transient(&err) => {
                    warn!(attempt, error = %err, "Transient LLM failure");
                    last_error = err.to_string();
                }
                Ok(Err(err)) => {
                    return Err(Error::GatewayFailure(format!("non-retryable: {}", err)));
                }
                Err(_) => {
                    warn!(attempt, timeout = ?self.config.timeout, "LLM call timed out");
                    last_error = format!("timed out after {:?}", self.config.timeout);
                }
            }
        }

        Err(Error::GatewayFailure(last_error))
    }

    /// Exponential backoff with jitter: base << (retry - 1), capped, plus
    /// up to 50% random jitter
    fn backoff_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(8);
        let backoff = self
            .config
            .base_backoff
            .saturating_mul(1 << shift)
            .min(self.config.max_backoff);
        let jitter_ceiling = (backoff.as_millis() as u64) / 2;
        let jitter = if jitter_ceiling > 0 {
            rand::rng().random_range(0..=jitter_ceiling)
        } else {
            0
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// Timeouts, connection failures, and 5xx-equivalent statuses are worth a
/// retry; everything else is not
fn is_transient(err: &Error) -> bool {
    match err {
        Error::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().map(|s| s.is_server_error()).unwrap_or(false)
        }
        Error::LlmStatus { status, .. } => *status >= 500,
        _ => false,
    }
}
