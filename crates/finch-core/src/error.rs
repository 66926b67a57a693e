//! Error types for Finch

use thiserror::Error;

/// Why a question could not be turned into a structured query
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvableReason {
    /// No recognizable or unambiguous time expression
    AmbiguousTimeRange,
    /// A category phrase matched nothing in the ledger or synonym table
    UnknownCategory,
    /// The question asks for an aggregation we don't support
    UnsupportedAggregation,
}

impl UnresolvableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmbiguousTimeRange => "ambiguous_time_range",
            Self::UnknownCategory => "unknown_category",
            Self::UnsupportedAggregation => "unsupported_aggregation",
        }
    }
}

impl std::fmt::Display for UnresolvableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rules file error: {0}")]
    Rules(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Intent parsing failed - user-facing, recoverable by rephrasing
    #[error("Could not resolve question ({reason}): {message}")]
    Unresolvable {
        reason: UnresolvableReason,
        message: String,
    },

    /// Ledger read failed - retryable by the caller
    #[error("Ledger unavailable: {0}")]
    SourceUnavailable(String),

    /// LLM backend returned a non-success status
    #[error("LLM backend error ({status}): {message}")]
    LlmStatus { status: u16, message: String },

    /// LLM unreachable or retries exhausted - callers fall back to the
    /// templated aggregation answer
    #[error("LLM gateway failure: {0}")]
    GatewayFailure(String),

    /// Gamification ingestion for a user the ledger doesn't know
    #[error("Unknown user: {0}")]
    UnknownUser(String),
}

impl Error {
    /// Shortcut for an Unresolvable error with a reason and message
    pub fn unresolvable(reason: UnresolvableReason, message: impl Into<String>) -> Self {
        Self::Unresolvable {
            reason,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
