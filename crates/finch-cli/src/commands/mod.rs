//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, seed) and shared utilities (open_db)
//! - `chat` - One-shot question answering (ask)
//! - `gamification` - XP commands (award, status, retry-pending)
//! - `serve` - Web server command

pub mod chat;
pub mod core;
pub mod gamification;
pub mod serve;

// Re-export command functions for main.rs
pub use chat::*;
pub use core::*;
pub use gamification::*;
pub use serve::*;
