//! Ledger store interface
//!
//! The transaction ledger is an external collaborator from the pipeline's
//! point of view: the aggregator only reads through this trait. A failed
//! read surfaces as `SourceUnavailable`, which callers may retry; an empty
//! result set is not an error.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{TimeRange, Transaction};

/// Read-only query interface over a user's transaction ledger
pub trait LedgerStore: Send + Sync {
    /// Transactions in a range, date-ordered, optionally category-filtered
    fn query_transactions(
        &self,
        user_id: &str,
        range: &TimeRange,
        categories: Option<&[String]>,
    ) -> Result<Vec<Transaction>>;

    /// Monotonically increasing per-user write counter; part of the
    /// aggregation cache key so cached results go stale on new writes
    fn ledger_version(&self, user_id: &str) -> Result<i64>;

    /// Distinct categories present in the user's ledger
    fn known_categories(&self, user_id: &str) -> Result<Vec<String>>;

    fn user_exists(&self, user_id: &str) -> Result<bool>;
}

/// Ledger store backed by the shared SQLite database
#[derive(Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Map storage failures to the retryable SourceUnavailable class
fn unavailable(err: Error) -> Error {
    match err {
        Error::Database(_) | Error::Pool(_) => Error::SourceUnavailable(err.to_string()),
        other => other,
    }
}

impl LedgerStore for SqliteLedger {
    fn query_transactions(
        &self,
        user_id: &str,
        range: &TimeRange,
        categories: Option<&[String]>,
    ) -> Result<Vec<Transaction>> {
        self.db
            .query_transactions(user_id, range, categories)
            .map_err(unavailable)
    }

    fn ledger_version(&self, user_id: &str) -> Result<i64> {
        self.db.ledger_version(user_id).map_err(unavailable)
    }

    fn known_categories(&self, user_id: &str) -> Result<Vec<String>> {
        self.db.known_categories(user_id).map_err(unavailable)
    }

    fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.db.user_exists(user_id).map_err(unavailable)
    }
}
