//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(y: i32, m: u32, d: u32, amount_minor: i64, category: &str) -> NewTransaction {
        NewTransaction {
            date: date(y, m, d),
            amount_minor,
            category: category.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(!db.user_exists("u1").unwrap());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "users",
            "transactions",
            "chat_exchanges",
            "xp_events",
            "gamification_state",
            "pending_xp_events",
            "gateway_metrics",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", Some("One")).unwrap();
        db.ensure_user("u1", Some("Other")).unwrap();
        assert!(db.user_exists("u1").unwrap());
        assert_eq!(db.ledger_version("u1").unwrap(), 0);
    }

    #[test]
    fn test_ledger_version_bumps_on_write() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();

        db.insert_transaction("u1", &tx(2024, 3, 1, -500, "Groceries")).unwrap();
        assert_eq!(db.ledger_version("u1").unwrap(), 1);

        db.insert_transactions(
            "u1",
            &[tx(2024, 3, 2, -600, "Groceries"), tx(2024, 3, 3, -700, "Dining")],
        )
        .unwrap();
        assert_eq!(db.ledger_version("u1").unwrap(), 2);
    }

    #[test]
    fn test_query_transactions_filters() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();
        db.ensure_user("u2", None).unwrap();
        db.insert_transactions(
            "u1",
            &[
                tx(2024, 3, 1, -500, "Groceries"),
                tx(2024, 3, 15, -600, "Dining"),
                tx(2024, 4, 1, -700, "Groceries"),
            ],
        )
        .unwrap();
        db.insert_transaction("u2", &tx(2024, 3, 5, -999, "Groceries")).unwrap();

        let march = TimeRange::new(date(2024, 3, 1), date(2024, 3, 31));

        let all = db.query_transactions("u1", &march, None).unwrap();
        assert_eq!(all.len(), 2);

        let groceries = db
            .query_transactions("u1", &march, Some(&["Groceries".to_string()]))
            .unwrap();
        assert_eq!(groceries.len(), 1);
        assert_eq!(groceries[0].amount_minor, -500);

        // Case-insensitive category filter
        let lower = db
            .query_transactions("u1", &march, Some(&["groceries".to_string()]))
            .unwrap();
        assert_eq!(lower.len(), 1);
    }

    #[test]
    fn test_known_categories() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();
        db.insert_transactions(
            "u1",
            &[
                tx(2024, 3, 1, -500, "Groceries"),
                tx(2024, 3, 2, -600, "Dining"),
                tx(2024, 3, 3, -700, "Groceries"),
            ],
        )
        .unwrap();

        assert_eq!(
            db.known_categories("u1").unwrap(),
            vec!["Dining".to_string(), "Groceries".to_string()]
        );
    }

    #[test]
    fn test_chat_log_append_and_list() {
        let db = Database::in_memory().unwrap();
        let exchange = NewChatExchange {
            user_id: "u1".into(),
            question: "How much did I spend last month?".into(),
            structured_query: Some("{}".into()),
            aggregation: Some("{}".into()),
            llm_reply: Some("You spent 80.00.".into()),
            answer: "You spent 80.00.".into(),
            reconciled: false,
            source: AnswerSource::Llm,
        };
        db.append_chat_exchange(&exchange).unwrap();
        db.append_chat_exchange(&exchange).unwrap();

        let listed = db.list_chat_exchanges("u1", 10).unwrap();
        assert_eq!(listed.len(), 2);
        // Newest first
        assert!(listed[0].id > listed[1].id);
    }

    #[test]
    fn test_xp_event_primary_key_dedupes() {
        let db = Database::in_memory().unwrap();
        db.ensure_user("u1", None).unwrap();

        let event = XPEvent {
            event_id: "e1".into(),
            user_id: "u1".into(),
            action: ActionKind::ExpenseLogged,
            xp_delta: 50,
        };
        let state = GamificationState {
            user_id: "u1".into(),
            total_xp: 50,
            level: 0,
            unlocked: Default::default(),
        };

        assert!(db.apply_xp_event(&event, 50, &state).unwrap());
        assert!(!db.apply_xp_event(&event, 50, &state).unwrap());
        assert!(db.xp_event_applied("e1").unwrap());

        let events = db.list_applied_events("u1").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_gamification_state_round_trip() {
        let db = Database::in_memory().unwrap();
        let mut state = GamificationState::new("u1");
        state.total_xp = 150;
        state.level = 1;
        state.unlocked.insert("century-club".into());

        db.save_gamification_state(&state).unwrap();
        let loaded = db.load_gamification_state("u1").unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_pending_queue_round_trip() {
        let db = Database::in_memory().unwrap();
        let event = XPEvent {
            event_id: "e1".into(),
            user_id: "u1".into(),
            action: ActionKind::GoalReached,
            xp_delta: 25,
        };

        let id = db.enqueue_pending_event(&event, "outage").unwrap();
        let pending = db.list_pending_events(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event, event);
        assert_eq!(pending[0].attempts, 0);

        db.bump_pending_attempts(id, "still down").unwrap();
        assert_eq!(db.list_pending_events(10).unwrap()[0].attempts, 1);

        db.delete_pending_event(id).unwrap();
        assert!(db.list_pending_events(10).unwrap().is_empty());
    }

    #[test]
    fn test_gateway_metrics_round_trip() {
        let db = Database::in_memory().unwrap();
        db.record_gateway_metric(&NewGatewayMetric {
            model: "llama3.2".into(),
            latency_ms: 420,
            success: true,
            error_message: None,
            attempts: 1,
        })
        .unwrap();

        let metrics = db.list_gateway_metrics(10).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].model, "llama3.2");
        assert!(metrics[0].success);
    }
}
