//! Event-sourced gamification engine
//!
//! User actions become XP events; current state (total XP, level, unlocked
//! achievements) is a fold over the immutable event log. Ingestion is
//! idempotent by event id and serialized per user, so replaying a delivery
//! never double-counts and achievement predicates always observe the state
//! the triggering event produced.
//!
//! The level curve and achievement catalog are data-driven (`rules`):
//! loadable from a TOML file with built-in defaults.

mod engine;
mod rules;

pub use engine::{GamificationEngine, IngestOutcome, RetryOutcome};
pub use rules::{Achievement, LevelCurve, Predicate, Rules};
