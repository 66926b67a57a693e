//! Gamification handlers - event ingestion, state reads, catalog

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use finch_core::models::{GamificationState, XPEvent};
use finch_core::{Achievement, IngestOutcome, RetryOutcome};

use crate::{AppError, AppState};

/// Response for an applied ingestion
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub state: GamificationState,
}

/// POST /gamification/events - idempotent XP event ingestion
///
/// Returns 200 with the resulting state, or 202 when a transient failure
/// queued the event for asynchronous retry. `UnknownUser` is a 404 - it
/// would never succeed on retry.
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<XPEvent>,
) -> Result<Response, AppError> {
    if event.event_id.trim().is_empty() {
        return Err(AppError::bad_request("event_id must not be empty"));
    }

    debug!(event_id = %event.event_id, user_id = %event.user_id, "Ingesting XP event");

    match state
        .engine
        .ingest_or_queue(&event)
        .await
        .map_err(AppError::from_core)?
    {
        IngestOutcome::Applied(new_state) => {
            Ok(Json(IngestResponse { state: new_state }).into_response())
        }
        IngestOutcome::Queued => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "queued": true })),
        )
            .into_response()),
    }
}

/// GET /gamification/state/:user_id - current derived state
pub async fn gamification_state(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<GamificationState>, AppError> {
    let current = state
        .engine
        .current_state(&user_id)
        .map_err(AppError::from_core)?;
    Ok(Json(current))
}

/// GET /gamification/achievements - the static catalog
pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<Achievement>> {
    Json(state.engine.rules().achievements.clone())
}

/// POST /gamification/retry - drain the pending ingestion retry queue
pub async fn retry_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RetryOutcome>, AppError> {
    let outcome = state
        .engine
        .retry_pending(100)
        .await
        .map_err(AppError::from_core)?;
    Ok(Json(outcome))
}
