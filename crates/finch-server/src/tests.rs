//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tower::ServiceExt;

use finch_core::ai::{Gateway, GatewayConfig, LlmClient, MockBackend};
use finch_core::models::NewTransaction;

fn seeded_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.ensure_user("u1", Some("Test User")).unwrap();
    db.insert_transactions(
        "u1",
        &[
            NewTransaction {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                amount_minor: 200_000,
                category: "Salary".into(),
                description: "March salary".into(),
            },
            NewTransaction {
                date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                amount_minor: -5_000,
                category: "Groceries".into(),
                description: "Weekly shop".into(),
            },
            NewTransaction {
                date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                amount_minor: -3_000,
                category: "Groceries".into(),
                description: "Top-up shop".into(),
            },
        ],
    )
    .unwrap();
    db
}

fn setup_test_app() -> Router {
    let state = AppState::new(seeded_db(), None, Rules::default()).unwrap();
    create_router(Arc::new(state), &ServerConfig::default())
}

fn setup_test_app_with_llm(reply: &str) -> Router {
    let gateway = Gateway::new(
        LlmClient::mock(MockBackend::with_reply(reply)),
        GatewayConfig::default(),
    );
    let state = AppState::new(seeded_db(), Some(gateway), Rules::default()).unwrap();
    create_router(Arc::new(state), &ServerConfig::default())
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ========== Chatbot API Tests ==========

#[tokio::test]
async fn test_chatbot_fallback_answer() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({
                "user_id": "u1",
                "question": "How much did I spend on groceries in March 2024?",
                "current_time": "2024-04-01"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert!(json["response"].as_str().unwrap().contains("80.00"));
    assert_eq!(json["meta"]["source"], "fallback");
    assert_eq!(json["meta"]["reconciled"], false);
    assert_eq!(json["meta"]["aggregation"]["value"]["total_minor"], -8000);
}

#[tokio::test]
async fn test_chatbot_reconciles_llm_reply() {
    let app = setup_test_app_with_llm("You spent $120.00 on groceries in March.");

    let response = app
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({
                "user_id": "u1",
                "question": "How much did I spend on groceries in March 2024?",
                "current_time": "2024-04-01"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let answer = json["response"].as_str().unwrap();
    assert!(answer.contains("$80.00"));
    assert!(!answer.contains("120"));
    assert_eq!(json["meta"]["source"], "llm");
    assert_eq!(json["meta"]["reconciled"], true);
}

#[tokio::test]
async fn test_chatbot_unresolvable_is_422() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({
                "user_id": "u1",
                "question": "How much did I spend on groceries?",
                "current_time": "2024-04-01"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["reason"], "ambiguous_time_range");
}

#[tokio::test]
async fn test_chatbot_unknown_user_is_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({
                "user_id": "ghost",
                "question": "How much did I spend last month?",
                "current_time": "2024-04-01"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chatbot_empty_question_is_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({ "user_id": "u1", "question": "  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_history_lists_exchanges() {
    let state = AppState::new(seeded_db(), None, Rules::default()).unwrap();
    let app = create_router(Arc::new(state), &ServerConfig::default());

    let response = app
        .clone()
        .oneshot(post_json(
            "/chatbot",
            serde_json::json!({
                "user_id": "u1",
                "question": "How much did I spend in March 2024?",
                "current_time": "2024-04-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/chat/history/u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let exchanges = json.as_array().unwrap();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0]["source"], "fallback");
}

// ========== Gamification API Tests ==========

#[tokio::test]
async fn test_ingest_event_returns_state() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/gamification/events",
            serde_json::json!({
                "event_id": "e1",
                "user_id": "u1",
                "action": "expense_logged",
                "xp_delta": 50
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["state"]["total_xp"], 50);
    assert!(json["state"]["unlocked"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("first-expense")));
}

#[tokio::test]
async fn test_duplicate_event_does_not_double_count() {
    let app = setup_test_app();
    let event = serde_json::json!({
        "event_id": "e1",
        "user_id": "u1",
        "action": "expense_logged",
        "xp_delta": 50
    });

    let first = app
        .clone()
        .oneshot(post_json("/gamification/events", event.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(post_json("/gamification/events", event))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let json = get_body_json(second).await;
    assert_eq!(json["state"]["total_xp"], 50);

    let response = app.oneshot(get("/gamification/state/u1")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["total_xp"], 50);
}

#[tokio::test]
async fn test_ingest_unknown_user_is_404() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/gamification/events",
            serde_json::json!({
                "event_id": "e1",
                "user_id": "ghost",
                "action": "expense_logged",
                "xp_delta": 50
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gamification_state_for_fresh_user() {
    let app = setup_test_app();

    let response = app.oneshot(get("/gamification/state/u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["total_xp"], 0);
    assert_eq!(json["level"], 0);
}

#[tokio::test]
async fn test_list_achievements() {
    let app = setup_test_app();

    let response = app.oneshot(get("/gamification/achievements")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert!(!json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_endpoint_reports_outcome() {
    let app = setup_test_app();

    let response = app.oneshot(post_json("/gamification/retry", serde_json::json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["retried"], 0);
}

// ========== Health ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["llm"], "unconfigured");
}
