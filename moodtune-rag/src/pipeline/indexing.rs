//! Indexing normalizer
//!
//! Turns candidates into storable documents (stable id, mood, timestamp,
//! `llm_text`), embeds them in one batch and upserts them by id.

use super::RagPipeline;
use crate::outcome::{guarded, Outcome};
use crate::text::slugify;
use crate::types::TrackCandidate;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Longest derived document id
pub const MAX_ID_CHARS: usize = 128;

/// Deterministic id for a generated entry: `llm-{emotion}-{title}-{artist}` (slugged)
pub fn derive_id(emotion: &str, title: &str, artist: &str) -> String {
    let id = format!("llm-{}-{}-{}", slugify(emotion), slugify(title), slugify(artist));
    let mut id: String = id.chars().take(MAX_ID_CHARS).collect();
    while id.ends_with('-') {
        id.pop();
    }
    id
}

/// Fill in id, mood, timestamp and `llm_text`; drop entries without a key
///
/// Existing ids, moods and timestamps are kept. `llm_text` is always rebuilt.
pub fn prepare_documents(
    candidates: Vec<TrackCandidate>,
    emotion: &str,
    now: DateTime<Utc>,
) -> Vec<TrackCandidate> {
    let emotion = emotion.trim().to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.key().is_some())
        .map(|mut doc| {
            doc.title = doc.title.trim().to_string();
            doc.artist = doc.artist.trim().to_string();
            let mood = doc
                .mood
                .take()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| emotion.clone());
            if doc.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                doc.id = Some(derive_id(&emotion, &doc.title, &doc.artist));
            }
            if doc.created_at.is_none() {
                doc.created_at = Some(now);
            }
            doc.llm_text = Some(doc.llm_text_for(&mood));
            doc.mood = Some(mood);
            doc
        })
        .collect()
}

impl RagPipeline {
    /// Prepare, embed and upsert `candidates` under `emotion`. Returns documents written.
    pub async fn normalize_and_index(&self, candidates: Vec<TrackCandidate>, emotion: &str) -> usize {
        let docs = prepare_documents(candidates, emotion, Utc::now());
        self.index_documents(docs).await
    }

    /// Embed and upsert already prepared documents
    ///
    /// Embedding failure or a count mismatch indexes the documents without
    /// vectors. A failed upsert writes nothing.
    pub(crate) async fn index_documents(&self, mut docs: Vec<TrackCandidate>) -> usize {
        if docs.is_empty() {
            return 0;
        }
        let timeout = self.config.call_timeout;

        let texts: Vec<String> = docs
            .iter()
            .map(|d| d.llm_text.clone().unwrap_or_default())
            .collect();
        match guarded("curator.embed", timeout, self.curator.embed(&texts)).await {
            Outcome::Success(vectors) if vectors.len() == docs.len() => {
                for (doc, vector) in docs.iter_mut().zip(vectors) {
                    doc.embedding = Some(vector);
                }
            }
            Outcome::Success(vectors) => {
                warn!(
                    expected = docs.len(),
                    received = vectors.len(),
                    "Embedding count mismatch, indexing without vectors"
                );
            }
            Outcome::Degraded(_) => {}
        }

        let written = guarded("store.upsert_many", timeout, self.store.upsert_many(&docs))
            .await
            .unwrap_or(0);
        info!(store = self.store.name(), written, total = docs.len(), "Documents indexed");
        written
    }
}
