//! Generative model API handlers
//!
//! POST /llm/playlist-meta, POST /llm/answer

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{emotion_or_default, request_body};
use crate::curator::PlaylistMeta;
use crate::error::{ApiError, ApiResult};
use crate::outcome::{guarded, Outcome};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistMetaRequest {
    pub emotion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerRequest {
    pub emotion: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub emotion: String,
    pub prompt: String,
    pub answer: String,
}

/// POST /llm/playlist-meta
pub async fn playlist_meta(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<PlaylistMeta>> {
    let request: PlaylistMetaRequest = request_body(&body)?;
    let emotion = emotion_or_default(request.emotion.as_deref());

    match guarded(
        "curator.short_metadata",
        state.pipeline.config().call_timeout,
        state.pipeline.curator().short_metadata(&emotion),
    )
    .await
    {
        Outcome::Success(meta) => Ok(Json(meta)),
        Outcome::Degraded(reason) => {
            state.record_error(reason.clone()).await;
            Err(ApiError::Upstream(reason))
        }
    }
}

/// POST /llm/answer
///
/// Answer a prompt using tracks retrieved for the emotion as context.
pub async fn answer(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AnswerResponse>> {
    let request: AnswerRequest = request_body(&body)?;
    let prompt = request.prompt.as_deref().map(str::trim).unwrap_or_default();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }
    let emotion = emotion_or_default(request.emotion.as_deref());

    let context = state.pipeline.search_tracks(&emotion, state.min_tracks).await;
    tracing::debug!(emotion = %emotion, context = context.len(), "Answering with context");

    match guarded(
        "curator.answer",
        state.pipeline.config().call_timeout,
        state.pipeline.curator().answer(&emotion, prompt, &context),
    )
    .await
    {
        Outcome::Success(answer) => Ok(Json(AnswerResponse {
            emotion,
            prompt: prompt.to_string(),
            answer,
        })),
        Outcome::Degraded(reason) => {
            state.record_error(reason.clone()).await;
            Err(ApiError::Upstream(reason))
        }
    }
}

/// Build generative model routes
pub fn llm_routes() -> Router<AppState> {
    Router::new()
        .route("/llm/playlist-meta", post(playlist_meta))
        .route("/llm/answer", post(answer))
}
