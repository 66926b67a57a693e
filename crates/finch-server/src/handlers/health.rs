//! Health endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::{AppError, AppState};

/// Health report
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// "connected", "unreachable", or "unconfigured"
    pub llm: &'static str,
}

/// GET /health - database and LLM backend reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let database = match state.db.conn() {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    let llm = match state.pipeline.gateway() {
        Some(gateway) => {
            if gateway.health_check().await {
                "connected"
            } else {
                "unreachable"
            }
        }
        None => "unconfigured",
    };

    Ok(Json(HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" },
        database,
        llm,
    }))
}
