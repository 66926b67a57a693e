//! Mock backend for testing
//!
//! Replies are scripted: each call pops the next entry, so tests can
//! exercise retry and fallback paths deterministically. With an empty
//! script every call returns a canned reply.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::prompt::ComposedPrompt;

use super::LlmBackend;

/// One scripted mock behavior
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text
    Text(String),
    /// Fail with an LLM status code (5xx = transient, 4xx = fatal)
    Status(u16, String),
    /// Never respond within any sane timeout
    Hang,
}

/// Mock LLM backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            healthy: true,
        }
    }

    /// Create a mock with a scripted reply sequence
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            healthy: true,
        }
    }

    /// Create a mock that always returns the given text
    pub fn with_reply(text: &str) -> Self {
        Self::scripted([MockReply::Text(text.to_string())])
    }

    /// Remaining scripted entries (for asserting consumption in tests)
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn next(&self) -> Option<MockReply> {
        let mut script = self.script.lock().ok()?;
        let reply = script.pop_front();
        // A single-entry script repeats its last reply forever
        if script.is_empty() {
            if let Some(last @ MockReply::Text(_)) = &reply {
                script.push_back(last.clone());
            }
        }
        reply
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn answer(&self, _prompt: &ComposedPrompt) -> Result<String> {
        match self.next() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Status(status, message)) => Err(Error::LlmStatus { status, message }),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::GatewayFailure("mock hang elapsed".into()))
            }
            None => Ok("Mock reply.".to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
