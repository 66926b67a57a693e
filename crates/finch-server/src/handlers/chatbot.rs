//! Chatbot handlers - the question answering endpoint and the exchange log

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use finch_core::models::{AggregationResult, AnswerSource, ChatExchange};

use crate::{AppError, AppState, MAX_HISTORY_LIMIT};

/// Request to the chatbot endpoint
#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    pub user_id: String,
    pub question: String,
    /// Reference date for relative time expressions; defaults to server time
    #[serde(default)]
    pub current_time: Option<NaiveDate>,
}

/// Answer metadata
#[derive(Debug, Serialize)]
pub struct ChatbotMeta {
    pub aggregation: Option<AggregationResult>,
    pub reconciled: bool,
    pub source: AnswerSource,
}

/// Response from the chatbot endpoint
#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    pub response: String,
    pub meta: ChatbotMeta,
}

/// POST /chatbot - answer a financial question
pub async fn ask_chatbot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatbotRequest>,
) -> Result<Json<ChatbotResponse>, AppError> {
    if payload.question.trim().is_empty() {
        return Err(AppError::bad_request("question must not be empty"));
    }

    let now = payload
        .current_time
        .unwrap_or_else(|| Utc::now().date_naive());

    debug!(user_id = %payload.user_id, "Answering chatbot question");

    let outcome = state
        .pipeline
        .answer(&payload.user_id, &payload.question, now)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(ChatbotResponse {
        response: outcome.answer,
        meta: ChatbotMeta {
            aggregation: Some(outcome.aggregation),
            reconciled: outcome.reconciled,
            source: outcome.source,
        },
    }))
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

/// GET /chat/history/:user_id - recent exchanges, newest first
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatExchange>>, AppError> {
    if !state.db.user_exists(&user_id).map_err(AppError::from_core)? {
        return Err(AppError::not_found(&format!("Unknown user: {}", user_id)));
    }

    let limit = params.limit.clamp(1, MAX_HISTORY_LIMIT);
    let exchanges = state
        .db
        .list_chat_exchanges(&user_id, limit)
        .map_err(AppError::from_core)?;
    Ok(Json(exchanges))
}
