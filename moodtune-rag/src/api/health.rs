//! Service root and health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::outcome::{guarded, Outcome};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the store cannot be reached
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    pub uptime_seconds: u64,
    /// Store backend name
    pub store: String,
    /// Documents in the collection (absent when the store is unreachable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<u64>,
    /// Last collaborator error reported by a handler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "name": "moodtune-rag", "status": "ok" }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let store = state.pipeline.store();
    let count = guarded(
        "store.count",
        state.pipeline.config().call_timeout,
        store.count(),
    )
    .await;
    let (status, documents) = match count {
        Outcome::Success(n) => ("ok", Some(n)),
        Outcome::Degraded(_) => ("degraded", None),
    };

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: status.to_string(),
        module: "moodtune-rag".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        store: store.name().to_string(),
        documents,
        last_error,
    })
}

/// Build root and health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
