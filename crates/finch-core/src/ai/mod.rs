//! Pluggable LLM backend abstraction
//!
//! - `LlmBackend` trait: the single operation the pipeline needs (answer a
//!   grounded prompt) plus health/identity accessors
//! - `LlmClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//! - Backend implementations: `OllamaBackend`, `MockBackend`
//! - `Gateway`: bounded-timeout, bounded-retry wrapper around a client
//!
//! # Configuration
//!
//! Environment variables:
//! - `OLLAMA_HOST`: Ollama server URL (required for the ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)

mod gateway;
mod mock;
mod ollama;

pub use gateway::{Gateway, GatewayConfig, GatewayReply};
pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;

use async_trait::async_trait;

use crate::error::Result;
use crate::prompt::ComposedPrompt;

/// Trait defining the interface for LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Answer a composed prompt, returning the raw reply text
    async fn answer(&self, prompt: &ComposedPrompt) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for metrics)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete LLM client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum LlmClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl LlmClient {
    /// Create an LLM client from environment variables
    ///
    /// Returns None if `OLLAMA_HOST` is not set - the pipeline then answers
    /// every question from the templated fallback path.
    pub fn from_env() -> Option<Self> {
        OllamaBackend::from_env().map(LlmClient::Ollama)
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        LlmClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock(backend: MockBackend) -> Self {
        LlmClient::Mock(backend)
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn answer(&self, prompt: &ComposedPrompt) -> Result<String> {
        match self {
            LlmClient::Ollama(b) => b.answer(prompt).await,
            LlmClient::Mock(b) => b.answer(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            LlmClient::Ollama(b) => b.health_check().await,
            LlmClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::Ollama(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::Ollama(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_identity() {
        let client = LlmClient::mock(MockBackend::new());
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
        assert!(client.health_check().await);
    }
}
