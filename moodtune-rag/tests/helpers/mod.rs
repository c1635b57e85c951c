//! Test Helper Utilities
//!
//! Shared utilities for testing moodtune-rag: scripted collaborators and
//! builders for pipelines and router state.

#![allow(dead_code)]

use async_trait::async_trait;
use moodtune_common::config::RagConfig;
use moodtune_rag::catalog::{
    AudioDescriptor, CatalogError, CatalogResolver, CatalogResult, ResolvedTrack,
};
use moodtune_rag::curator::{Curator, CuratorError, CuratorResult, PlaylistMeta};
use moodtune_rag::emotion::EmotionTable;
use moodtune_rag::pipeline::{PipelineConfig, RagPipeline};
use moodtune_rag::store::{MemoryStore, MoodQuery, StoreError, StoreResult, TrackStore};
use moodtune_rag::types::{SongPair, TrackCandidate};
use moodtune_rag::AppState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EMBEDDING_DIM: usize = 4;

// ============================================================================
// Documents
// ============================================================================

/// A stored document with an id, mood and metrics
pub fn stored(id: &str, title: &str, artist: &str, mood: &str, valence: f64, energy: f64) -> TrackCandidate {
    TrackCandidate {
        id: Some(id.to_string()),
        mood: Some(mood.to_string()),
        valence,
        energy,
        ..TrackCandidate::new(title, artist)
    }
}

/// Twelve "happy" documents laid out so the base ranges match 5, the first
/// relaxation 8 and the second relaxation 12
pub fn happy_library() -> Vec<TrackCandidate> {
    let mut docs = Vec::new();
    for i in 1..=5 {
        docs.push(stored(&format!("h-{:02}", i), &format!("Store Song {}", i), "Store Artist", "happy", 0.8, 0.8));
    }
    for i in 6..=8 {
        docs.push(stored(&format!("h-{:02}", i), &format!("Store Song {}", i), "Store Artist", "happy", 0.55, 0.8));
    }
    for i in 9..=12 {
        docs.push(stored(&format!("h-{:02}", i), &format!("Store Song {}", i), "Store Artist", "happy", 0.45, 0.8));
    }
    docs
}

pub fn pair(title: &str, artist: &str) -> SongPair {
    SongPair::new(title, artist)
}

/// `n` suggestions that collide with nothing in [`happy_library`]
pub fn fresh_pairs(n: usize) -> Vec<SongPair> {
    (1..=n)
        .map(|i| pair(&format!("Fresh Tune {}", i), &format!("New Band {}", i)))
        .collect()
}

// ============================================================================
// Store
// ============================================================================

/// [`MemoryStore`] with call counters and switchable failures
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub search_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub fail_search: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn with_documents(docs: impl IntoIterator<Item = TrackCandidate>) -> Self {
        Self {
            inner: MemoryStore::with_documents(docs),
            ..Self::default()
        }
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> StoreError {
    StoreError::Network("connection refused".to_string())
}

#[async_trait]
impl TrackStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn search(&self, query: &MoodQuery) -> StoreResult<Vec<TrackCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.search(query).await
    }

    async fn upsert_many(&self, docs: &[TrackCandidate]) -> StoreResult<usize> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.upsert_many(docs).await
    }

    async fn find_by_title_artist(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> StoreResult<Vec<TrackCandidate>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.find_by_title_artist(title, artist, limit).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.inner.count().await
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.ensure_collection().await
    }

    async fn recreate_collection(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.recreate_collection().await
    }
}

// ============================================================================
// Curator
// ============================================================================

/// Curator that replays one suggestion list per `curate` call
#[derive(Default)]
pub struct ScriptedCurator {
    rounds: Mutex<VecDeque<Vec<SongPair>>>,
    /// Returned once the script runs out
    pub repeat: Mutex<Vec<SongPair>>,
    pub curate_calls: AtomicUsize,
    /// Avoid-list seen by each `curate` call
    pub avoid_seen: Mutex<Vec<Vec<SongPair>>>,
    pub fail: AtomicBool,
    /// Wrong-length embedding responses when set
    pub short_embeddings: AtomicBool,
    pub delay: Option<Duration>,
}

impl ScriptedCurator {
    pub fn new(rounds: Vec<Vec<SongPair>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            ..Self::default()
        }
    }

    /// Returns `pairs` on every call
    pub fn repeating(pairs: Vec<SongPair>) -> Self {
        Self {
            repeat: Mutex::new(pairs),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        let curator = Self::default();
        curator.fail.store(true, Ordering::SeqCst);
        curator
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.curate_calls.load(Ordering::SeqCst)
    }

    pub fn avoid_lists(&self) -> Vec<Vec<SongPair>> {
        self.avoid_seen.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self) -> CuratorResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CuratorError::Api(503, "model overloaded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Curator for ScriptedCurator {
    async fn curate(
        &self,
        _emotion: &str,
        _count: usize,
        avoid: &[SongPair],
        _guidance: &str,
    ) -> CuratorResult<Vec<SongPair>> {
        self.curate_calls.fetch_add(1, Ordering::SeqCst);
        self.avoid_seen.lock().unwrap().push(avoid.to_vec());
        self.pause().await;
        self.check()?;

        let next = self.rounds.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.repeat.lock().unwrap().clone()))
    }

    async fn embed(&self, texts: &[String]) -> CuratorResult<Vec<Vec<f32>>> {
        self.check()?;
        let n = if self.short_embeddings.load(Ordering::SeqCst) {
            texts.len().saturating_sub(1)
        } else {
            texts.len()
        };
        Ok(vec![vec![0.25; EMBEDDING_DIM]; n])
    }

    async fn short_metadata(&self, emotion: &str) -> CuratorResult<PlaylistMeta> {
        self.pause().await;
        self.check()?;
        Ok(PlaylistMeta {
            title: format!("Bright {}", emotion),
            description: format!("Songs for a {} afternoon.", emotion),
        })
    }

    async fn answer(
        &self,
        emotion: &str,
        prompt: &str,
        context: &[TrackCandidate],
    ) -> CuratorResult<String> {
        self.pause().await;
        self.check()?;
        Ok(format!("{} ({}): {} tracks considered", prompt, emotion, context.len()))
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Catalog that resolves every pair except the titles listed in `unknown`
#[derive(Default)]
pub struct ScriptedCatalog {
    pub unknown: HashSet<String>,
    /// Lower-cased suggested title to the catalog's own spelling
    pub canonical: HashMap<String, SongPair>,
    /// Provider tag given to resolved tracks
    pub provider: String,
    /// Descriptors returned for these external ids
    pub descriptors: HashMap<String, AudioDescriptor>,
    pub resolve_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl ScriptedCatalog {
    pub fn spotify() -> Self {
        Self {
            provider: "spotify".to_string(),
            ..Self::default()
        }
    }

    pub fn with_unknown(mut self, titles: &[&str]) -> Self {
        self.unknown = titles.iter().map(|t| t.to_lowercase()).collect();
        self
    }

    pub fn with_descriptor(mut self, external_id: &str, valence: f64, energy: f64) -> Self {
        self.descriptors
            .insert(external_id.to_string(), AudioDescriptor { valence, energy });
        self
    }

    /// Resolve `suggested` to `title` / `artist` instead of echoing it
    pub fn with_canonical(mut self, suggested: &str, title: &str, artist: &str) -> Self {
        self.canonical
            .insert(suggested.to_lowercase(), SongPair::new(title, artist));
        self
    }

    pub fn failing() -> Self {
        let catalog = Self::spotify();
        catalog.fail.store(true, Ordering::SeqCst);
        catalog
    }

    pub fn resolves(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

/// External id the scripted catalog assigns to a title
pub fn external_id_for(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

#[async_trait]
impl CatalogResolver for ScriptedCatalog {
    async fn resolve_batch(
        &self,
        pairs: &[SongPair],
        _per_item_limit: usize,
    ) -> CatalogResult<Vec<ResolvedTrack>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Api(502, "bad gateway".to_string()));
        }
        Ok(pairs
            .iter()
            .filter(|p| !self.unknown.contains(&p.title.to_lowercase()))
            .map(|p| {
                let found = self
                    .canonical
                    .get(&p.title.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| p.clone());
                let id = external_id_for(&found.title);
                ResolvedTrack {
                    uri: Some(format!("{}:track:{}", self.provider, id)),
                    external_id: Some(id),
                    provider: self.provider.clone(),
                    title: found.title,
                    artist: found.artist,
                    ..ResolvedTrack::default()
                }
            })
            .collect())
    }

    async fn audio_descriptors(
        &self,
        ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioDescriptor>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("unreachable".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.descriptors.get(id).map(|d| (id.clone(), *d)))
            .collect())
    }

    async fn emotion_table(&self) -> CatalogResult<EmotionTable> {
        Ok(EmotionTable::builtin())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        call_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

pub fn build_pipeline(
    store: Arc<CountingStore>,
    curator: Arc<ScriptedCurator>,
    catalog: Arc<ScriptedCatalog>,
    config: PipelineConfig,
) -> RagPipeline {
    RagPipeline::new(store, curator, catalog, EmotionTable::builtin(), config)
}

/// Router state with `min_tracks` = 20 and `seed_per_emotion` = 3
pub fn build_state(
    store: Arc<CountingStore>,
    curator: Arc<ScriptedCurator>,
    catalog: Arc<ScriptedCatalog>,
) -> AppState {
    let rag = RagConfig {
        seed_per_emotion: 3,
        ..RagConfig::default()
    };
    let pipeline = build_pipeline(store, curator, catalog, test_config());
    AppState::new(Arc::new(pipeline), &rag)
}
