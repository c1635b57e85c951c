//! Generative curator
//!
//! Suggests (title, artist) pairs for an emotion, computes text embeddings,
//! writes short playlist metadata and answers questions over a track context.
//! The pipeline only sees the [`Curator`] trait; [`OpenAiCurator`] is the HTTP
//! implementation.

pub mod openai;
pub mod parse;

pub use openai::OpenAiCurator;

use crate::types::{SongPair, TrackCandidate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum playlist title length (chars)
pub const TITLE_MAX_CHARS: usize = 100;
/// Maximum playlist description length (chars)
pub const DESCRIPTION_MAX_CHARS: usize = 300;
/// Tracks included in an answer context
pub const ANSWER_CONTEXT_LIMIT: usize = 20;

/// Curator client errors
#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body was not the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty completion")]
    EmptyCompletion,
}

pub type CuratorResult<T> = Result<T, CuratorError>;

/// Short playlist title and description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistMeta {
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait Curator: Send + Sync {
    /// Up to `count` suggestions for `emotion`, steering away from `avoid`
    async fn curate(
        &self,
        emotion: &str,
        count: usize,
        avoid: &[SongPair],
        guidance: &str,
    ) -> CuratorResult<Vec<SongPair>>;

    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> CuratorResult<Vec<Vec<f32>>>;

    async fn short_metadata(&self, emotion: &str) -> CuratorResult<PlaylistMeta>;

    /// Free-form answer grounded on `context`
    async fn answer(
        &self,
        emotion: &str,
        prompt: &str,
        context: &[TrackCandidate],
    ) -> CuratorResult<String>;
}
