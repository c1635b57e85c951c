//! Core data types shared by every pipeline stage
//!
//! - [`TrackCandidate`]: the one record shape flowing through retrieval,
//!   augmentation, merge and indexing
//! - [`TrackKey`]: case-insensitive (title, artist) identity
//! - [`KeySet`]: request-scoped avoid set
//! - [`SongPair`]: bare (title, artist) suggestion exchanged with collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Track Candidate
// ============================================================================

/// A track flowing through the pipeline
///
/// Entries read from the document store are authoritative. Entries built by the
/// augmentation engine stay ephemeral until the indexing normalizer fills in
/// `id`, `created_at`, `embedding` and `llm_text`.
///
/// Fields missing from a stored record deserialize to their defaults; an entry
/// with an empty title or artist has no [`TrackKey`] and is skipped by merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCandidate {
    /// Stable id, unique within the store (None until indexed for generated entries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id in the upstream catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Catalog source tag (e.g. "spotify", "itunes")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Provenance tag (e.g. "llm+music")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Emotion label the entry was retrieved or generated for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Valence in [0, 1], measured or inferred from the emotion midpoint
    #[serde(default)]
    pub valence: f64,
    /// Energy in [0, 1], measured or inferred from the emotion midpoint
    #[serde(default)]
    pub energy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Indexable text: `"{mood} | {title} - {artist}"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_text: Option<String>,
}

impl TrackCandidate {
    /// Create a bare candidate with title and artist set
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Identity key, or None when title or artist is empty
    pub fn key(&self) -> Option<TrackKey> {
        TrackKey::new(&self.title, &self.artist)
    }

    /// Build the indexable text for this entry under `mood`
    pub fn llm_text_for(&self, mood: &str) -> String {
        format!("{} | {} - {}", mood, self.title, self.artist)
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Case-insensitive (title, artist) identity of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub title: String,
    pub artist: String,
}

impl TrackKey {
    /// Trim and lower-case both fields. Returns None when either is empty.
    pub fn new(title: &str, artist: &str) -> Option<Self> {
        let title = title.trim().to_lowercase();
        let artist = artist.trim().to_lowercase();
        if title.is_empty() || artist.is_empty() {
            return None;
        }
        Some(Self { title, artist })
    }
}

/// A bare (title, artist) pair as exchanged with the curator and catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongPair {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

impl SongPair {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Trimmed copy, or None when either field is empty after trimming
    pub fn cleaned(&self) -> Option<Self> {
        let title = self.title.trim();
        let artist = self.artist.trim();
        if title.is_empty() || artist.is_empty() {
            return None;
        }
        Some(Self::new(title, artist))
    }

    pub fn key(&self) -> Option<TrackKey> {
        TrackKey::new(&self.title, &self.artist)
    }
}

impl From<&TrackKey> for SongPair {
    fn from(key: &TrackKey) -> Self {
        Self::new(key.title.clone(), key.artist.clone())
    }
}

// ============================================================================
// Avoid Set
// ============================================================================

/// Insertion-ordered set of track keys, scoped to one pipeline invocation
///
/// Order matters only for [`KeySet::avoid_list`]: keys seen first (store
/// results) are the first ones handed to the curator.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    seen: HashSet<TrackKey>,
    order: Vec<TrackKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the keys of every keyed candidate
    pub fn from_candidates<'a>(candidates: impl IntoIterator<Item = &'a TrackCandidate>) -> Self {
        let mut set = Self::new();
        for candidate in candidates {
            if let Some(key) = candidate.key() {
                set.insert(key);
            }
        }
        set
    }

    /// Insert a key. Returns false if it was already present.
    pub fn insert(&mut self, key: TrackKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push(key);
        true
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackKey> {
        self.order.iter()
    }

    /// At most `cap` pairs, in insertion order
    pub fn avoid_list(&self, cap: usize) -> Vec<SongPair> {
        self.order.iter().take(cap).map(SongPair::from).collect()
    }
}
