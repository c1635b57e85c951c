//! Administrative handlers (development use)
//!
//! POST /admin/seed, POST /admin/rebuild

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use super::request_body;
use crate::error::{ApiError, ApiResult};
use crate::seed::SeedReport;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SeedRequest {
    pub per_emotion: Option<i64>,
}

fn per_emotion(request: &SeedRequest, default: usize) -> ApiResult<usize> {
    match request.per_emotion {
        None => Ok(default),
        Some(n) if n >= 1 => Ok(n as usize),
        Some(n) => Err(ApiError::BadRequest(format!(
            "per_emotion must be at least 1 (got {})",
            n
        ))),
    }
}

/// POST /admin/seed
pub async fn seed(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SeedReport>)> {
    let request: SeedRequest = request_body(&body)?;
    let per_emotion = per_emotion(&request, state.seed_per_emotion)?;

    tracing::info!(per_emotion, "Seeding knowledge base");
    let report = state.pipeline.seed_knowledge(per_emotion).await;
    Ok((StatusCode::CREATED, Json(report)))
}

/// POST /admin/rebuild
///
/// Recreates the collection, then seeds it.
pub async fn rebuild(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SeedReport>)> {
    let request: SeedRequest = request_body(&body)?;
    let per_emotion = per_emotion(&request, state.seed_per_emotion)?;

    tracing::warn!(per_emotion, "Rebuilding knowledge base");
    let report = state.pipeline.rebuild(per_emotion).await;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/seed", post(seed))
        .route("/admin/rebuild", post(rebuild))
}
