//! CLI command tests

use tempfile::TempDir;

use crate::commands;

fn temp_db(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("finch.db")
}

#[test]
fn test_cmd_init_unencrypted() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);

    commands::cmd_init(&db_path, true).unwrap();
    assert!(db_path.exists());
}

#[test]
fn test_cmd_seed_imports_transactions() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);
    commands::cmd_init(&db_path, true).unwrap();

    let csv_path = dir.path().join("txns.csv");
    std::fs::write(
        &csv_path,
        "date,amount,category,description\n\
         2024-03-01,2000.00,Salary,March salary\n\
         2024-03-02,-50.00,Groceries,Weekly shop\n",
    )
    .unwrap();

    commands::cmd_seed(&db_path, &csv_path, "alice", true).unwrap();

    let db = commands::open_db(&db_path, true).unwrap();
    assert!(db.user_exists("alice").unwrap());
    assert_eq!(db.ledger_version("alice").unwrap(), 1);
    assert_eq!(
        db.known_categories("alice").unwrap(),
        vec!["Groceries".to_string(), "Salary".to_string()]
    );
}

#[test]
fn test_cmd_seed_rejects_bad_csv() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);
    commands::cmd_init(&db_path, true).unwrap();

    let csv_path = dir.path().join("bad.csv");
    std::fs::write(&csv_path, "date,amount,category,description\nnope,x,y,z\n").unwrap();

    assert!(commands::cmd_seed(&db_path, &csv_path, "alice", true).is_err());
}

#[tokio::test]
async fn test_cmd_award_and_status() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);
    commands::cmd_init(&db_path, true).unwrap();

    let db = commands::open_db(&db_path, true).unwrap();
    db.ensure_user("alice", None).unwrap();
    drop(db);

    commands::cmd_award(&db_path, "alice", "e1", "expense_logged", 50, true)
        .await
        .unwrap();
    // Replay of the same event id is a no-op
    commands::cmd_award(&db_path, "alice", "e1", "expense_logged", 50, true)
        .await
        .unwrap();

    let db = commands::open_db(&db_path, true).unwrap();
    let state = db.load_gamification_state("alice").unwrap().unwrap();
    assert_eq!(state.total_xp, 50);

    commands::cmd_status(&db_path, "alice", false, true).unwrap();
    commands::cmd_status(&db_path, "alice", true, true).unwrap();
}

#[tokio::test]
async fn test_cmd_award_unknown_user_fails() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);
    commands::cmd_init(&db_path, true).unwrap();

    let result = commands::cmd_award(&db_path, "ghost", "e1", "expense_logged", 50, true).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_retry_pending_empty_queue() {
    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);
    commands::cmd_init(&db_path, true).unwrap();

    commands::cmd_retry_pending(&db_path, true).await.unwrap();
}
