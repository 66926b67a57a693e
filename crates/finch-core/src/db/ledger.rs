//! User and transaction ledger operations
//!
//! The ledger is append-only from the core's point of view: transactions are
//! inserted (seeding, expense logging) and read back for aggregation, never
//! updated. Every write bumps the user's ledger version so cached
//! aggregations keyed on it go stale.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TimeRange, Transaction};

impl Database {
    /// Create a user if it doesn't exist yet
    pub fn ensure_user(&self, user_id: &str, display_name: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (id, display_name) VALUES (?, ?)",
            params![user_id, display_name],
        )?;
        Ok(())
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Current ledger version for a user (bumped on every write)
    pub fn ledger_version(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT ledger_version FROM users WHERE id = ?",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Insert a single transaction and bump the user's ledger version
    pub fn insert_transaction(&self, user_id: &str, tx: &NewTransaction) -> Result<i64> {
        let mut conn = self.conn()?;
        let dbtx = conn.transaction()?;

        dbtx.execute(
            "INSERT INTO transactions (user_id, date, amount_minor, category, description)
             VALUES (?, ?, ?, ?, ?)",
            params![
                user_id,
                tx.date.to_string(),
                tx.amount_minor,
                tx.category,
                tx.description,
            ],
        )?;
        let id = dbtx.last_insert_rowid();

        dbtx.execute(
            "UPDATE users SET ledger_version = ledger_version + 1 WHERE id = ?",
            params![user_id],
        )?;

        dbtx.commit()?;
        Ok(id)
    }

    /// Bulk insert (seeding); bumps the ledger version once for the batch
    pub fn insert_transactions(&self, user_id: &str, txs: &[NewTransaction]) -> Result<usize> {
        let mut conn = self.conn()?;
        let dbtx = conn.transaction()?;

        for tx in txs {
            dbtx.execute(
                "INSERT INTO transactions (user_id, date, amount_minor, category, description)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    user_id,
                    tx.date.to_string(),
                    tx.amount_minor,
                    tx.category,
                    tx.description,
                ],
            )?;
        }

        dbtx.execute(
            "UPDATE users SET ledger_version = ledger_version + 1 WHERE id = ?",
            params![user_id],
        )?;

        dbtx.commit()?;
        Ok(txs.len())
    }

    /// Query transactions for a user in a date range, optionally filtered by
    /// category (case-insensitive), ordered by date then insertion order
    pub fn query_transactions(
        &self,
        user_id: &str,
        range: &TimeRange,
        categories: Option<&[String]>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        // Build dynamic WHERE clause
        let mut sql = String::from(
            "SELECT id, user_id, date, amount_minor, category, description, created_at
             FROM transactions
             WHERE user_id = ? AND date >= ? AND date <= ?",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(user_id.to_string()),
            Box::new(range.start.to_string()),
            Box::new(range.end.to_string()),
        ];

        if let Some(cats) = categories {
            if !cats.is_empty() {
                let placeholders = vec!["LOWER(?)"; cats.len()].join(", ");
                sql.push_str(&format!(" AND LOWER(category) IN ({})", placeholders));
                for cat in cats {
                    params_vec.push(Box::new(cat.clone()));
                }
            }
        }

        sql.push_str(" ORDER BY date, id");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let transactions = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(Transaction {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    date: row
                        .get::<_, String>(2)?
                        .parse::<NaiveDate>()
                        .unwrap_or_default(),
                    amount_minor: row.get(3)?,
                    category: row.get(4)?,
                    description: row.get(5)?,
                    created_at: parse_datetime(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Distinct categories present in a user's ledger
    pub fn known_categories(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM transactions WHERE user_id = ? ORDER BY category",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }
}
