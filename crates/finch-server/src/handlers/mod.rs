//! HTTP request handlers organized by domain

pub mod chatbot;
pub mod gamification;
pub mod health;

// Re-export all handlers for use in router
pub use chatbot::*;
pub use gamification::*;
pub use health::*;
