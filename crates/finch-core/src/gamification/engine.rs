//! The gamification engine: idempotent, per-user-serialized XP ingestion
//!
//! Invariants upheld here:
//! - replaying an event id is a no-op (idempotent skip)
//! - total_xp never goes below zero; penalty deltas are clamped and the
//!   effective delta is stored on the event row for audit
//! - achievement predicates are evaluated against the state the event just
//!   produced, atomically with the XP application
//! - writes for one user are mutually exclusive; different users proceed in
//!   parallel, and there is no global lock

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{GamificationState, StateChanged, XPEvent};

use super::rules::Rules;

/// Broadcast buffer for state-change notifications
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of an ingest-or-queue call
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Applied (or idempotently skipped); carries the current state
    Applied(GamificationState),
    /// Transient failure; the event is queued for asynchronous retry
    Queued,
}

/// Result of draining the pending retry queue
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RetryOutcome {
    pub retried: usize,
    pub succeeded: usize,
    /// Permanently dropped (unknown user - fatal, not retried)
    pub dropped: usize,
}

/// Event-sourced gamification engine over one database
pub struct GamificationEngine {
    db: Database,
    rules: Rules,
    /// Per-user write locks (single-writer-per-user discipline)
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    events_tx: broadcast::Sender<StateChanged>,
}

impl GamificationEngine {
    pub fn new(db: Database, rules: Rules) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            rules,
            locks: StdMutex::new(HashMap::new()),
            events_tx,
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Subscribe to state-change notifications
    ///
    /// Within a user, notifications arrive in application order; across
    /// users there is no ordering guarantee.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.events_tx.subscribe()
    }

    /// Ingest an XP event and return the resulting state
    ///
    /// Idempotent: a duplicate event id returns the current state without
    /// changing anything. Fails with `UnknownUser` for users the ledger
    /// doesn't know.
    pub async fn ingest(&self, event: &XPEvent) -> Result<GamificationState> {
        if !self.db.user_exists(&event.user_id)? {
            return Err(Error::UnknownUser(event.user_id.clone()));
        }

        let lock = self.user_lock(&event.user_id);
        let _guard = lock.lock().await;

        if self.db.xp_event_applied(&event.event_id)? {
            debug!(event_id = %event.event_id, "Duplicate XP event; idempotent skip");
            return self.current_state(&event.user_id);
        }

        let current = self
            .db
            .load_gamification_state(&event.user_id)?
            .unwrap_or_else(|| GamificationState::new(&event.user_id));

        // Clamp at zero; the effective delta is what actually lands
        let proposed = current.total_xp + event.xp_delta;
        let effective_delta = if proposed < 0 {
            -current.total_xp
        } else {
            event.xp_delta
        };
        let total_xp = current.total_xp + effective_delta;

        let mut updated = GamificationState {
            user_id: current.user_id.clone(),
            total_xp,
            level: self.rules.curve.level_for(total_xp),
            unlocked: current.unlocked.clone(),
        };

        // Predicates must observe this event too, not a stale snapshot
        let mut stats = self.db.action_stats(&event.user_id)?;
        let entry = stats.entry(event.action.as_str().to_string()).or_default();
        entry.count += 1;
        entry.xp_sum += effective_delta;

        for achievement in &self.rules.achievements {
            if updated.unlocked.contains(&achievement.id) {
                continue;
            }
            if achievement.predicate.satisfied(&updated, &stats) {
                info!(
                    user_id = %event.user_id,
                    achievement = %achievement.id,
                    "Achievement unlocked"
                );
                updated.unlocked.insert(achievement.id.clone());
            }
        }

        // Event row and snapshot land in one transaction
        let applied = self.db.apply_xp_event(event, effective_delta, &updated)?;
        if !applied {
            return self.current_state(&event.user_id);
        }

        // No receivers is fine
        let _ = self.events_tx.send(StateChanged {
            user_id: updated.user_id.clone(),
            state: updated.clone(),
        });

        Ok(updated)
    }

    /// Ingest, queueing transient failures for asynchronous retry
    ///
    /// The triggering user action (e.g. expense logging) must never fail
    /// because gamification hiccuped: storage errors queue the event and
    /// report `Queued`. `UnknownUser` stays fatal - it would never succeed
    /// on retry.
    pub async fn ingest_or_queue(&self, event: &XPEvent) -> Result<IngestOutcome> {
        match self.ingest(event).await {
            Ok(state) => Ok(IngestOutcome::Applied(state)),
            Err(err @ Error::UnknownUser(_)) => Err(err),
            Err(err) => {
                warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "XP ingestion failed; queueing for retry"
                );
                self.db.enqueue_pending_event(event, &err.to_string())?;
                Ok(IngestOutcome::Queued)
            }
        }
    }

    /// Drain the pending retry queue
    pub async fn retry_pending(&self, limit: i64) -> Result<RetryOutcome> {
        let pending = self.db.list_pending_events(limit)?;
        let mut outcome = RetryOutcome::default();

        for item in pending {
            outcome.retried += 1;
            match self.ingest(&item.event).await {
                Ok(_) => {
                    self.db.delete_pending_event(item.id)?;
                    outcome.succeeded += 1;
                }
                Err(Error::UnknownUser(user)) => {
                    warn!(event_id = %item.event.event_id, user_id = %user,
                          "Dropping pending event for unknown user");
                    self.db.delete_pending_event(item.id)?;
                    outcome.dropped += 1;
                }
                Err(err) => {
                    self.db.bump_pending_attempts(item.id, &err.to_string())?;
                }
            }
        }

        Ok(outcome)
    }

    /// Current state snapshot for a user (zero state if nothing applied yet)
    pub fn current_state(&self, user_id: &str) -> Result<GamificationState> {
        if !self.db.user_exists(user_id)? {
            return Err(Error::UnknownUser(user_id.to_string()));
        }
        Ok(self
            .db
            .load_gamification_state(user_id)?
            .unwrap_or_else(|| GamificationState::new(user_id)))
    }

    /// Rebuild state by folding the full event log, overwrite the snapshot,
    /// and return it
    ///
    /// The snapshot is a cache; this is the proof. Clamping is re-derived
    /// from the requested deltas, so the fold reproduces history exactly.
    pub fn rebuild_state(&self, user_id: &str) -> Result<GamificationState> {
        if !self.db.user_exists(user_id)? {
            return Err(Error::UnknownUser(user_id.to_string()));
        }

        let events = self.db.list_applied_events(user_id)?;
        let mut state = GamificationState::new(user_id);
        let mut stats: HashMap<String, crate::db::ActionStats> = HashMap::new();

        for event in &events {
            let proposed = state.total_xp + event.xp_delta;
            let effective = if proposed < 0 {
                -state.total_xp
            } else {
                event.xp_delta
            };
            state.total_xp += effective;
            state.level = self.rules.curve.level_for(state.total_xp);

            let entry = stats.entry(event.action.as_str().to_string()).or_default();
            entry.count += 1;
            entry.xp_sum += effective;

            for achievement in &self.rules.achievements {
                if !state.unlocked.contains(&achievement.id)
                    && achievement.predicate.satisfied(&state, &stats)
                {
                    state.unlocked.insert(achievement.id.clone());
                }
            }
        }

        self.db.save_gamification_state(&state)?;
        Ok(state)
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;

    fn engine() -> GamificationEngine {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();
        db.ensure_user("u2", None).unwrap();
        GamificationEngine::new(db, Rules::default())
    }

    fn event(id: &str, user: &str, action: ActionKind, delta: i64) -> XPEvent {
        XPEvent {
            event_id: id.to_string(),
            user_id: user.to_string(),
            action,
            xp_delta: delta,
        }
    }

    #[tokio::test]
    async fn test_ingest_accumulates_xp() {
        let engine = engine();
        let state = engine
            .ingest(&event("e1", "u1", ActionKind::ExpenseLogged, 50))
            .await
            .unwrap();
        assert_eq!(state.total_xp, 50);

        let state = engine
            .ingest(&event("e2", "u1", ActionKind::ExpenseLogged, 60))
            .await
            .unwrap();
        assert_eq!(state.total_xp, 110);
        assert_eq!(state.level, 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_idempotent() {
        let engine = engine();
        let e = event("e1", "u1", ActionKind::ExpenseLogged, 50);

        let first = engine.ingest(&e).await.unwrap();
        let second = engine.ingest(&e).await.unwrap();

        assert_eq!(first.total_xp, 50);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_delivery() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();
        let engine = Arc::new(GamificationEngine::new(db, Rules::default()));

        let e = event("e1", "u1", ActionKind::ExpenseLogged, 50);
        let (a, b) = tokio::join!(
            {
                let engine = engine.clone();
                let e = e.clone();
                async move { engine.ingest(&e).await }
            },
            {
                let engine = engine.clone();
                let e = e.clone();
                async move { engine.ingest(&e).await }
            }
        );

        assert_eq!(a.unwrap().total_xp, 50);
        assert_eq!(b.unwrap().total_xp, 50);
        assert_eq!(engine.current_state("u1").unwrap().total_xp, 50);
    }

    #[tokio::test]
    async fn test_penalties_clamp_at_zero() {
        let engine = engine();
        engine
            .ingest(&event("e1", "u1", ActionKind::ExpenseLogged, 30))
            .await
            .unwrap();
        let state = engine
            .ingest(&event("e2", "u1", ActionKind::BudgetBlown, -100))
            .await
            .unwrap();
        assert_eq!(state.total_xp, 0);

        // The clamped delta is recorded for audit
        let events = engine.db.list_applied_events("u1").unwrap();
        assert_eq!(events[1].xp_delta, -100);
        assert_eq!(events[1].effective_delta, -30);

        // Further positive XP builds from zero, not from a hidden debt
        let state = engine
            .ingest(&event("e3", "u1", ActionKind::ExpenseLogged, 20))
            .await
            .unwrap();
        assert_eq!(state.total_xp, 20);
    }

    #[tokio::test]
    async fn test_achievement_unlocks_exactly_on_satisfying_event() {
        let engine = engine();

        let state = engine
            .ingest(&event("e1", "u1", ActionKind::GoalReached, 99))
            .await
            .unwrap();
        assert!(!state.unlocked.contains("century-club"));
        assert!(state.unlocked.contains("goal-getter"));

        let state = engine
            .ingest(&event("e2", "u1", ActionKind::GoalReached, 1))
            .await
            .unwrap();
        assert!(state.unlocked.contains("century-club"));
        assert!(state.unlocked.contains("monthly-saver"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_fatal() {
        let engine = engine();
        let err = engine
            .ingest(&event("e1", "ghost", ActionKind::ExpenseLogged, 50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownUser(_)));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let engine = engine();
        engine
            .ingest(&event("e1", "u1", ActionKind::ExpenseLogged, 50))
            .await
            .unwrap();
        engine
            .ingest(&event("e2", "u2", ActionKind::ExpenseLogged, 70))
            .await
            .unwrap();

        assert_eq!(engine.current_state("u1").unwrap().total_xp, 50);
        assert_eq!(engine.current_state("u2").unwrap().total_xp, 70);
    }

    #[tokio::test]
    async fn test_rebuild_reproduces_snapshot() {
        let engine = engine();
        for (i, delta) in [50, -200, 120, 40, -10].into_iter().enumerate() {
            engine
                .ingest(&event(
                    &format!("e{}", i),
                    "u1",
                    ActionKind::ExpenseLogged,
                    delta,
                ))
                .await
                .unwrap();
        }

        let snapshot = engine.current_state("u1").unwrap();
        let rebuilt = engine.rebuild_state("u1").unwrap();
        assert_eq!(rebuilt, snapshot);
    }

    #[tokio::test]
    async fn test_state_changed_notifications_in_order() {
        let engine = engine();
        let mut rx = engine.subscribe();

        for i in 0..3 {
            engine
                .ingest(&event(&format!("e{}", i), "u1", ActionKind::ExpenseLogged, 10))
                .await
                .unwrap();
        }

        let mut totals = Vec::new();
        for _ in 0..3 {
            totals.push(rx.recv().await.unwrap().state.total_xp);
        }
        assert_eq!(totals, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_retry_pending_drains_queue() {
        let engine = engine();
        let e = event("e1", "u1", ActionKind::ExpenseLogged, 50);
        engine.db.enqueue_pending_event(&e, "transient outage").unwrap();

        let ghost = event("e2", "ghost", ActionKind::ExpenseLogged, 10);
        engine.db.enqueue_pending_event(&ghost, "transient outage").unwrap();

        let outcome = engine.retry_pending(10).await.unwrap();
        assert_eq!(outcome.retried, 2);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.dropped, 1);

        assert_eq!(engine.current_state("u1").unwrap().total_xp, 50);
        assert!(engine.db.list_pending_events(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_is_idempotent_with_original_delivery() {
        // The event both succeeded and was queued (duplicate delivery path)
        let engine = engine();
        let e = event("e1", "u1", ActionKind::ExpenseLogged, 50);
        engine.ingest(&e).await.unwrap();
        engine.db.enqueue_pending_event(&e, "spurious failure").unwrap();

        let outcome = engine.retry_pending(10).await.unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(engine.current_state("u1").unwrap().total_xp, 50);
    }
}
