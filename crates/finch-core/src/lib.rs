//! Finch Core Library
//!
//! Shared functionality for the Finch financial chatbot backend:
//! - Database access and migrations
//! - Intent resolution (free-text question to structured query)
//! - Deterministic transaction aggregation with fingerprint caching
//! - Grounded prompt composition
//! - LLM gateway with bounded timeout, retries, and fallback
//! - Response reconciliation (ledger beats LLM)
//! - Event-sourced gamification engine (XP, levels, achievements)
//! - Ledger seeding from CSV

pub mod aggregate;
pub mod ai;
pub mod chat;
pub mod db;
pub mod error;
pub mod gamification;
pub mod import;
pub mod intent;
pub mod ledger;
pub mod models;
pub mod prompt;
pub mod reconcile;

pub use aggregate::Aggregator;
pub use ai::{Gateway, GatewayConfig, GatewayReply, LlmBackend, LlmClient, MockBackend, OllamaBackend};
pub use chat::{ChatOutcome, ChatPipeline};
pub use db::Database;
pub use error::{Error, Result, UnresolvableReason};
pub use gamification::{Achievement, GamificationEngine, IngestOutcome, LevelCurve, Predicate, RetryOutcome, Rules};
pub use intent::IntentResolver;
pub use ledger::{LedgerStore, SqliteLedger};
pub use prompt::{compose, ComposedPrompt};
pub use reconcile::{Reconciled, Reconciler, ReplySegment};
