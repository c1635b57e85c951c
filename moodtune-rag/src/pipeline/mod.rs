//! Emotion-conditioned retrieval pipeline
//!
//! One call runs these stages in order:
//! 1. [`retrieval`]: filtered store search with bounded range relaxation
//! 2. [`augment`]: generate/filter/resolve loop when the store comes up short
//! 3. [`merge`]: priority-preserving dedup of store results and new candidates
//! 4. [`indexing`]: deterministic ids, embeddings and upsert of new candidates
//!
//! Collaborator failures never abort a run; they shrink its output.

pub mod augment;
pub mod indexing;
pub mod merge;
pub mod retrieval;

pub use indexing::derive_id;
pub use merge::merge_candidates;

use crate::catalog::CatalogResolver;
use crate::curator::Curator;
use crate::emotion::EmotionTable;
use crate::store::TrackStore;
use crate::types::{KeySet, TrackCandidate};
use moodtune_common::config::RagConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Pipeline tuning knobs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_relax_steps: u32,
    pub relax_step: f64,
    pub augment_rounds: u32,
    pub avoid_cap: usize,
    /// Hard limit on every collaborator call
    pub call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

impl From<&RagConfig> for PipelineConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            max_relax_steps: config.max_relax_steps,
            relax_step: config.relax_step,
            augment_rounds: config.augment_rounds,
            avoid_cap: config.avoid_cap,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }
}

/// Result of [`RagPipeline::augment_and_persist`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub emotion: String,
    pub requested_min: usize,
    pub returned: usize,
    pub items: Vec<TrackCandidate>,
    /// Set when fewer than `requested_min` items were found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// New documents written to the store
    pub indexed: usize,
}

/// Upper bound on items handed back to callers
pub fn presentation_cap(min_tracks: usize) -> usize {
    (min_tracks * 2).max(50)
}

/// Advisory note when a run comes up short
pub fn shortfall_note(returned: usize, requested: usize) -> Option<String> {
    (returned < requested).then(|| format!("insufficient results ({}/{})", returned, requested))
}

/// Output of one retrieval + augmentation run
struct RunOutput {
    items: Vec<TrackCandidate>,
    /// Newly manufactured candidates (already normalized, not yet stored)
    generated: Vec<TrackCandidate>,
}

pub struct RagPipeline {
    store: Arc<dyn TrackStore>,
    curator: Arc<dyn Curator>,
    catalog: Arc<dyn CatalogResolver>,
    emotions: EmotionTable,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn TrackStore>,
        curator: Arc<dyn Curator>,
        catalog: Arc<dyn CatalogResolver>,
        emotions: EmotionTable,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            curator,
            catalog,
            emotions,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    pub fn curator(&self) -> &Arc<dyn Curator> {
        &self.curator
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogResolver> {
        &self.catalog
    }

    pub fn emotions(&self) -> &EmotionTable {
        &self.emotions
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn run(&self, emotion: &str, min_tracks: usize) -> RunOutput {
        let emotion = emotion.trim().to_lowercase();
        let cap = presentation_cap(min_tracks);

        // Already unique by key and capped
        let retrieved = self
            .retrieve(&emotion, min_tracks, self.config.max_relax_steps)
            .await;
        if retrieved.len() >= min_tracks {
            return RunOutput {
                items: retrieved,
                generated: Vec::new(),
            };
        }

        let mut existing = KeySet::from_candidates(&retrieved);
        let desired = min_tracks - retrieved.len();
        let fresh = self.augment(&emotion, &mut existing, desired).await;
        let generated = indexing::prepare_documents(fresh, &emotion, chrono::Utc::now());

        let mut items = merge_candidates(&[retrieved.as_slice(), generated.as_slice()], min_tracks);
        items.truncate(cap);

        RunOutput { items, generated }
    }

    /// Retrieve, augment if short, and merge. Nothing is written to the store.
    pub async fn search_tracks(&self, emotion: &str, min_tracks: usize) -> Vec<TrackCandidate> {
        self.run(emotion, min_tracks).await.items
    }

    /// [`search_tracks`](Self::search_tracks), then index the new candidates
    pub async fn augment_and_persist(&self, emotion: &str, min_tracks: usize) -> SearchReport {
        let label = emotion.trim().to_lowercase();
        let RunOutput { items, generated } = self.run(&label, min_tracks).await;

        let indexed = if generated.is_empty() {
            0
        } else {
            self.index_documents(generated).await
        };

        let note = shortfall_note(items.len(), min_tracks);
        info!(
            emotion = %label,
            requested = min_tracks,
            returned = items.len(),
            indexed,
            short = note.is_some(),
            "Search finished"
        );

        SearchReport {
            emotion: label,
            requested_min: min_tracks,
            returned: items.len(),
            items,
            note,
            indexed,
        }
    }
}
