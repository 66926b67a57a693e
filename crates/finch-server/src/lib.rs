//! Finch Web Server
//!
//! Axum-based REST API for the Finch financial chatbot backend.
//!
//! Surface:
//! - `POST /chatbot` - ask a question; always answers best-effort (the
//!   templated fallback covers LLM outages)
//! - `GET /chat/history/:user_id` - recent exchanges from the append-only log
//! - `POST /gamification/events` - idempotent XP event ingestion
//! - `GET /gamification/state/:user_id` - current derived state
//! - `GET /gamification/achievements` - the static achievement catalog
//! - `POST /gamification/retry` - drain the pending ingestion retry queue
//! - `GET /health` - database and LLM backend reachability

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use finch_core::ai::Gateway;
use finch_core::db::Database;
use finch_core::{ChatPipeline, GamificationEngine, Rules};

mod handlers;
mod scheduler;

pub use scheduler::{start_retry_scheduler, RetryScheduleConfig};

#[cfg(test)]
mod tests;

/// Maximum chat history page size
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    /// The query pipeline (intent -> aggregate -> prompt -> gateway -> reconcile)
    pub pipeline: ChatPipeline,
    /// Event-sourced gamification engine
    pub engine: GamificationEngine,
}

impl AppState {
    pub fn new(db: Database, gateway: Option<Gateway>, rules: Rules) -> anyhow::Result<Self> {
        let pipeline = ChatPipeline::new(db.clone(), gateway)?;
        let engine = GamificationEngine::new(db.clone(), rules);
        Ok(Self {
            db,
            pipeline,
            engine,
        })
    }
}

/// Build the router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/chatbot", post(handlers::ask_chatbot))
        .route("/chat/history/:user_id", get(handlers::chat_history))
        .route("/gamification/events", post(handlers::ingest_event))
        .route("/gamification/state/:user_id", get(handlers::gamification_state))
        .route("/gamification/achievements", get(handlers::list_achievements))
        .route("/gamification/retry", post(handlers::retry_pending))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(
    db: Database,
    gateway: Option<Gateway>,
    rules: Rules,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    match &gateway {
        Some(gw) => {
            if gw.health_check().await {
                info!("LLM backend connected: {} ({})", gw.host(), gw.model());
            } else {
                warn!(
                    "LLM backend configured but not responding: {} - answers will fall back",
                    gw.host()
                );
            }
        }
        None => {
            info!("LLM backend not configured (set OLLAMA_HOST to enable); using templated answers");
        }
    }

    let state = Arc::new(AppState::new(db, gateway, rules)?);

    // Queued XP ingestions are retried asynchronously, never dropped
    if let Some(retry_config) = RetryScheduleConfig::from_env() {
        start_retry_scheduler(state.clone(), retry_config);
    }

    let app = create_router(state, &config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    reason: Option<&'static str>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            reason: None,
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            reason: None,
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            reason: None,
            internal: None,
        }
    }

    /// Map a core error to its API status per the error taxonomy:
    /// Unresolvable -> 422, UnknownUser -> 404, SourceUnavailable -> 503,
    /// GatewayFailure -> 502, everything else -> sanitized 500
    pub fn from_core(err: finch_core::Error) -> Self {
        use finch_core::Error as E;
        match err {
            E::Unresolvable { reason, message } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message,
                reason: Some(reason.as_str()),
                internal: None,
            },
            E::UnknownUser(user) => Self::not_found(&format!("Unknown user: {}", user)),
            E::SourceUnavailable(message) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message,
                reason: None,
                internal: None,
            },
            E::GatewayFailure(message) => Self {
                status: StatusCode::BAD_GATEWAY,
                message,
                reason: None,
                internal: None,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                reason: None,
                internal: Some(other.into()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = match self.reason {
            Some(reason) => Json(serde_json::json!({
                "error": self.message,
                "reason": reason,
            })),
            None => Json(serde_json::json!({
                "error": self.message
            })),
        };

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            reason: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
