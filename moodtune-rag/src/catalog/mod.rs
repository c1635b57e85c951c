//! External music catalog
//!
//! Resolves suggested (title, artist) pairs to canonical catalog tracks and
//! provides audio descriptors for resolved ids. [`MusicServiceClient`] is the
//! HTTP implementation.

pub mod music_service;

pub use music_service::MusicServiceClient;

use crate::emotion::EmotionTable;
use crate::types::{SongPair, TrackCandidate};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Only this provider exposes valence/energy descriptors
pub const DESCRIPTOR_PROVIDER: &str = "spotify";

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Valence and energy measured by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioDescriptor {
    pub valence: f64,
    pub energy: f64,
}

/// A catalog match for one suggestion
///
/// Accepts both the normalized shape (`title`, `artist`, `external_id`) and
/// raw provider shapes (`name`, `artists[0].name`, `id`, iTunes artwork keys).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedTrack {
    pub external_id: Option<String>,
    /// Lower-cased provider tag, "ext" when the catalog gives none
    pub provider: String,
    pub title: String,
    pub artist: String,
    pub uri: Option<String>,
    pub preview_url: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResolvedTrack {
    #[serde(default)]
    external_id: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    artists: Vec<RawArtist>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default, rename = "artworkUrl60")]
    artwork_url_60: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawArtist {
    #[serde(default)]
    name: Option<String>,
}

/// Catalog ids come back as strings or numbers depending on the provider
fn id_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawResolvedTrack> for ResolvedTrack {
    fn from(raw: RawResolvedTrack) -> Self {
        let artist = raw
            .artists
            .into_iter()
            .find_map(|a| a.name)
            .or(raw.artist)
            .unwrap_or_default();
        let image_url = raw.image_url.or(raw.artwork_url_100).or(raw.thumbnail_url.clone());
        let thumbnail_url = raw.thumbnail_url.or(raw.artwork_url_60).or(image_url.clone());

        Self {
            external_id: id_string(raw.external_id).or_else(|| id_string(raw.id)),
            provider: raw
                .provider
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "ext".to_string()),
            title: raw.title.or(raw.name).unwrap_or_default().trim().to_string(),
            artist: artist.trim().to_string(),
            uri: raw.uri,
            preview_url: raw.preview_url,
            image_url,
            thumbnail_url,
        }
    }
}

impl<'de> Deserialize<'de> for ResolvedTrack {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawResolvedTrack::deserialize(deserializer).map(ResolvedTrack::from)
    }
}

impl ResolvedTrack {
    /// Catalog-derived document id (`{provider}-{external_id}`)
    pub fn catalog_id(&self) -> Option<String> {
        self.external_id
            .as_ref()
            .map(|ext| format!("{}-{}", self.provider, ext))
    }

    pub fn has_descriptors(&self) -> bool {
        self.provider == DESCRIPTOR_PROVIDER && self.external_id.is_some()
    }

    /// Candidate carrying the catalog fields; mood and metrics are left for the caller
    pub fn into_candidate(self) -> TrackCandidate {
        TrackCandidate {
            id: self.catalog_id(),
            external_id: self.external_id,
            provider: Some(self.provider),
            title: self.title,
            artist: self.artist,
            uri: self.uri,
            preview_url: self.preview_url,
            image_url: self.image_url,
            thumbnail_url: self.thumbnail_url,
            ..TrackCandidate::default()
        }
    }
}

#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// First match per input pair; unmatched pairs are omitted
    async fn resolve_batch(
        &self,
        pairs: &[SongPair],
        per_item_limit: usize,
    ) -> CatalogResult<Vec<ResolvedTrack>>;

    /// Descriptors keyed by external id; ids without data are absent
    async fn audio_descriptors(&self, ids: &[String])
        -> CatalogResult<HashMap<String, AudioDescriptor>>;

    /// Emotion table published by the catalog service
    async fn emotion_table(&self) -> CatalogResult<EmotionTable>;
}
