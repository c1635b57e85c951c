//! moodtune-rag library interface
//!
//! Emotion-conditioned track retrieval with generative augmentation. The
//! binary wires concrete collaborators into a [`pipeline::RagPipeline`] and
//! serves it over HTTP; integration tests build the same router with fakes.

pub mod api;
pub mod budget;
pub mod catalog;
pub mod curator;
pub mod emotion;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod seed;
pub mod store;
pub mod text;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use moodtune_common::config::RagConfig;
use pipeline::RagPipeline;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    /// Default `min_tracks` for requests that omit it
    pub min_tracks: usize,
    /// Default `per_emotion` for admin seeding
    pub seed_per_emotion: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last collaborator error surfaced by a handler
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>, rag: &RagConfig) -> Self {
        Self {
            pipeline,
            min_tracks: rag.min_tracks,
            seed_per_emotion: rag.seed_per_emotion,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::rag_routes())
        .merge(api::llm_routes())
        .merge(api::admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
