//! XP event log, gamification state snapshots, and the pending retry queue
//!
//! The `xp_events` table is the source of truth (append-only, keyed by
//! event_id for idempotency). The `gamification_state` table is a derived
//! snapshot cache that must always be reconstructible from the log.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{
    ActionKind, AppliedXPEvent, GamificationState, PendingXPEvent, XPEvent,
};

/// Per-action event statistics used by achievement predicates
#[derive(Debug, Clone, Default)]
pub struct ActionStats {
    pub count: i64,
    /// Sum of effective (post-clamp) deltas
    pub xp_sum: i64,
}

impl Database {
    /// Whether an event id has already been applied (idempotency check)
    pub fn xp_event_applied(&self, event_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM xp_events WHERE event_id = ?",
                params![event_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Apply an event and persist the resulting state snapshot atomically
    ///
    /// Returns false without touching the snapshot when the event id was
    /// already applied (duplicate delivery).
    pub fn apply_xp_event(
        &self,
        event: &XPEvent,
        effective_delta: i64,
        state: &GamificationState,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let dbtx = conn.transaction()?;

        let inserted = dbtx.execute(
            "INSERT OR IGNORE INTO xp_events (event_id, user_id, action, xp_delta, effective_delta)
             VALUES (?, ?, ?, ?, ?)",
            params![
                event.event_id,
                event.user_id,
                event.action.as_str(),
                event.xp_delta,
                effective_delta,
            ],
        )?;

        if inserted == 0 {
            // Duplicate: the unlock/state snapshot from the first delivery stands
            return Ok(false);
        }

        let unlocked_json = serde_json::to_string(&state.unlocked)?;
        dbtx.execute(
            "INSERT INTO gamification_state (user_id, total_xp, level, unlocked, updated_at)
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id) DO UPDATE SET
                total_xp = excluded.total_xp,
                level = excluded.level,
                unlocked = excluded.unlocked,
                updated_at = CURRENT_TIMESTAMP",
            params![state.user_id, state.total_xp, state.level, unlocked_json],
        )?;

        dbtx.commit()?;
        Ok(true)
    }

    /// Load the snapshot for a user (None if no events were ever applied)
    pub fn load_gamification_state(&self, user_id: &str) -> Result<Option<GamificationState>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT user_id, total_xp, level, unlocked FROM gamification_state WHERE user_id = ?",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?
        .map(|(user_id, total_xp, level, unlocked)| {
            Ok(GamificationState {
                user_id,
                total_xp,
                level: level as u32,
                unlocked: serde_json::from_str(&unlocked)?,
            })
        })
        .transpose()
    }

    /// Overwrite the snapshot (used when rebuilding from the event log)
    pub fn save_gamification_state(&self, state: &GamificationState) -> Result<()> {
        let conn = self.conn()?;
        let unlocked_json = serde_json::to_string(&state.unlocked)?;
        conn.execute(
            "INSERT INTO gamification_state (user_id, total_xp, level, unlocked, updated_at)
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id) DO UPDATE SET
                total_xp = excluded.total_xp,
                level = excluded.level,
                unlocked = excluded.unlocked,
                updated_at = CURRENT_TIMESTAMP",
            params![state.user_id, state.total_xp, state.level, unlocked_json],
        )?;
        Ok(())
    }

    /// All applied events for a user in application order
    pub fn list_applied_events(&self, user_id: &str) -> Result<Vec<AppliedXPEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT event_id, user_id, action, xp_delta, effective_delta, created_at
             FROM xp_events
             WHERE user_id = ?
             ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(AppliedXPEvent {
                event_id: row.get(0)?,
                user_id: row.get(1)?,
                action: row
                    .get::<_, String>(2)?
                    .parse()
                    .unwrap_or(ActionKind::Custom("unknown".into())),
                xp_delta: row.get(3)?,
                effective_delta: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Per-action counts and XP sums, for achievement predicates
    pub fn action_stats(&self, user_id: &str) -> Result<HashMap<String, ActionStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT action, COUNT(*), SUM(effective_delta)
             FROM xp_events
             WHERE user_id = ?
             GROUP BY action",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = HashMap::new();
        for row in rows {
            let (action, count, xp_sum) = row?;
            stats.insert(action, ActionStats { count, xp_sum });
        }
        Ok(stats)
    }

    // ========== Pending Retry Queue ==========

    /// Queue a failed ingestion for asynchronous retry (never silently drop)
    pub fn enqueue_pending_event(&self, event: &XPEvent, error: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pending_xp_events (event_json, error) VALUES (?, ?)",
            params![serde_json::to_string(event)?, error],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Pending events, oldest first
    pub fn list_pending_events(&self, limit: i64) -> Result<Vec<PendingXPEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, event_json, error, attempts, queued_at
             FROM pending_xp_events
             ORDER BY id
             LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (id, event_json, error, attempts, queued_at) = row?;
            pending.push(PendingXPEvent {
                id,
                event: serde_json::from_str(&event_json)?,
                error,
                attempts,
                queued_at: parse_datetime(&queued_at),
            });
        }
        Ok(pending)
    }

    pub fn delete_pending_event(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM pending_xp_events WHERE id = ?", params![id])?;
        Ok(())
    }

    pub fn bump_pending_attempts(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pending_xp_events SET attempts = attempts + 1, error = ? WHERE id = ?",
            params![error, id],
        )?;
        Ok(())
    }
}
