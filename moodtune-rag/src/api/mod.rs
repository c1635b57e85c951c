//! HTTP API handlers for moodtune-rag
//!
//! - `/`, `/health`: service status
//! - `/rag/*`: emotion search and playlist assembly
//! - `/llm/*`: playlist metadata and contextual answers
//! - `/admin/*`: knowledge-base seeding (development use)

pub mod admin;
pub mod health;
pub mod llm;
pub mod rag;

pub use admin::admin_routes;
pub use health::health_routes;
pub use llm::llm_routes;
pub use rag::rag_routes;

use crate::error::{ApiError, ApiResult};
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Emotion used when a request names none
pub const DEFAULT_EMOTION: &str = "relaxed";

/// Lower-cased emotion label, or the default when missing/blank
pub fn emotion_or_default(emotion: Option<&str>) -> String {
    emotion
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EMOTION)
        .to_lowercase()
}

/// Requested minimum, or `default` when absent. Must be at least 1.
pub fn min_tracks_or_default(requested: Option<i64>, default: usize) -> ApiResult<usize> {
    match requested {
        None => Ok(default),
        Some(n) if n >= 1 => Ok(n as usize),
        Some(n) => Err(ApiError::BadRequest(format!(
            "min_tracks must be at least 1 (got {})",
            n
        ))),
    }
}

/// Parse an optional JSON body
///
/// A missing or blank body yields `T::default()`; anything else must parse.
pub fn request_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}
