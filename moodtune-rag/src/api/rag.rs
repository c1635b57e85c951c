//! RAG API handlers
//!
//! POST /rag/search, POST /rag/playlist

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{emotion_or_default, min_tracks_or_default, request_body};
use crate::curator::{parse::default_description, PlaylistMeta};
use crate::error::ApiResult;
use crate::outcome::{guarded, Outcome};
use crate::pipeline::SearchReport;
use crate::types::TrackCandidate;
use crate::AppState;

/// Body for both RAG endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub emotion: Option<String>,
    pub min_tracks: Option<i64>,
}

/// POST /rag/playlist response
#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub emotion: String,
    pub title: String,
    pub description: String,
    pub returned: usize,
    pub items: Vec<TrackCandidate>,
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// POST /rag/search
///
/// Retrieve (and augment when short) tracks for an emotion. New tracks are indexed.
pub async fn search(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SearchReport>> {
    let request: SearchRequest = request_body(&body)?;
    let emotion = emotion_or_default(request.emotion.as_deref());
    let min_tracks = min_tracks_or_default(request.min_tracks, state.min_tracks)?;

    tracing::info!(emotion = %emotion, min_tracks, "RAG search");
    let report = state.pipeline.augment_and_persist(&emotion, min_tracks).await;
    Ok(Json(report))
}

/// POST /rag/playlist
///
/// Search results plus a generated title and description. Metadata generation
/// failure falls back to a plain title.
pub async fn playlist(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<PlaylistResponse>> {
    let request: SearchRequest = request_body(&body)?;
    let emotion = emotion_or_default(request.emotion.as_deref());
    let min_tracks = min_tracks_or_default(request.min_tracks, state.min_tracks)?;

    let report = state.pipeline.augment_and_persist(&emotion, min_tracks).await;

    let meta = match guarded(
        "curator.short_metadata",
        state.pipeline.config().call_timeout,
        state.pipeline.curator().short_metadata(&emotion),
    )
    .await
    {
        Outcome::Success(meta) => meta,
        Outcome::Degraded(reason) => {
            state.record_error(reason).await;
            PlaylistMeta {
                title: format!("{} playlist", emotion),
                description: default_description(&emotion),
            }
        }
    };

    let uris = report
        .items
        .iter()
        .filter_map(|t| t.uri.clone())
        .filter(|u| !u.is_empty())
        .collect();

    Ok(Json(PlaylistResponse {
        emotion: report.emotion,
        title: meta.title,
        description: meta.description,
        returned: report.returned,
        items: report.items,
        uris,
        note: report.note,
    }))
}

/// Build RAG routes
pub fn rag_routes() -> Router<AppState> {
    Router::new()
        .route("/rag/search", post(search))
        .route("/rag/playlist", post(playlist))
}
