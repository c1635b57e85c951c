//! Document store adapters
//!
//! The pipeline talks to the mood-tagged track collection only through
//! [`TrackStore`]. Three backends are provided:
//! - [`OpenSearchStore`]: OpenSearch over HTTP/JSON
//! - [`SqliteStore`]: local SQLite file via sqlx
//! - [`MemoryStore`]: in-process map, used for development and tests
//!
//! Every backend treats a missing collection as "no results" on the read path
//! and creates it lazily.

pub mod memory;
pub mod opensearch;
pub mod sqlite;

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;
pub use sqlite::SqliteStore;

use crate::emotion::ValueRange;
use crate::types::TrackCandidate;
use async_trait::async_trait;
use thiserror::Error;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network communication error (includes client-side timeouts)
    #[error("Network error: {0}")]
    Network(String),

    /// Store returned an error response
    #[error("Store API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse a store response
    #[error("Parse error: {0}")]
    Parse(String),

    /// SQLite backend error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (database file location)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filtered search over the collection
#[derive(Debug, Clone, PartialEq)]
pub struct MoodQuery {
    /// Exact mood tag (lower-cased)
    pub mood: String,
    /// Inclusive valence range
    pub valence: ValueRange,
    /// Inclusive energy range
    pub energy: ValueRange,
    pub limit: usize,
}

impl MoodQuery {
    pub fn new(mood: &str, valence: ValueRange, energy: ValueRange, limit: usize) -> Self {
        Self {
            mood: mood.trim().to_lowercase(),
            valence,
            energy,
            limit,
        }
    }

    /// True when `track` satisfies the mood tag and both ranges
    pub fn matches(&self, track: &TrackCandidate) -> bool {
        track.mood.as_deref() == Some(self.mood.as_str())
            && self.valence.contains(track.valence)
            && self.energy.contains(track.energy)
    }
}

/// Mood-tagged track collection
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Entries matching the mood tag and both ranges, at most `query.limit`.
    /// A missing collection yields an empty list and triggers lazy creation.
    async fn search(&self, query: &MoodQuery) -> StoreResult<Vec<TrackCandidate>>;

    /// Insert or overwrite each document by id; refreshes read visibility.
    /// Documents without an id are skipped. Returns the number written.
    async fn upsert_many(&self, docs: &[TrackCandidate]) -> StoreResult<usize>;

    /// Approximate match on both title and artist (AND semantics)
    async fn find_by_title_artist(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> StoreResult<Vec<TrackCandidate>>;

    /// Number of documents (0 when the collection does not exist)
    async fn count(&self) -> StoreResult<u64>;

    async fn ensure_collection(&self) -> StoreResult<()>;

    /// Drop and recreate the collection, deleting every document
    async fn recreate_collection(&self) -> StoreResult<()>;
}
