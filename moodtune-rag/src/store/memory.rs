//! In-process track store
//!
//! Keeps documents in a map keyed by id. Starts without a collection so the
//! lazy-creation path behaves like the networked backends.

use super::{MoodQuery, StoreResult, TrackStore};
use crate::text::matches_all_tokens;
use crate::types::TrackCandidate;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// None until the collection is created
    docs: RwLock<Option<BTreeMap<String, TrackCandidate>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an existing collection holding `docs`
    pub fn with_documents(docs: impl IntoIterator<Item = TrackCandidate>) -> Self {
        let map = docs
            .into_iter()
            .filter_map(|d| d.id.clone().map(|id| (id, d)))
            .collect();
        Self {
            docs: RwLock::new(Some(map)),
        }
    }

    /// Snapshot of one document
    pub async fn get(&self, id: &str) -> Option<TrackCandidate> {
        self.docs
            .read()
            .await
            .as_ref()
            .and_then(|docs| docs.get(id).cloned())
    }

    pub async fn collection_exists(&self) -> bool {
        self.docs.read().await.is_some()
    }
}

#[async_trait]
impl TrackStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(&self, query: &MoodQuery) -> StoreResult<Vec<TrackCandidate>> {
        {
            let guard = self.docs.read().await;
            if let Some(docs) = guard.as_ref() {
                return Ok(docs
                    .values()
                    .filter(|d| query.matches(d))
                    .take(query.limit)
                    .cloned()
                    .collect());
            }
        }
        self.ensure_collection().await?;
        Ok(Vec::new())
    }

    async fn upsert_many(&self, docs: &[TrackCandidate]) -> StoreResult<usize> {
        let mut guard = self.docs.write().await;
        let collection = guard.get_or_insert_with(BTreeMap::new);
        let mut written = 0;
        for doc in docs {
            if let Some(id) = &doc.id {
                collection.insert(id.clone(), doc.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn find_by_title_artist(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> StoreResult<Vec<TrackCandidate>> {
        let guard = self.docs.read().await;
        let Some(docs) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|d| matches_all_tokens(&d.title, title) && matches_all_tokens(&d.artist, artist))
            .take(limit.max(1))
            .cloned()
            .collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self
            .docs
            .read()
            .await
            .as_ref()
            .map(|d| d.len() as u64)
            .unwrap_or(0))
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let mut guard = self.docs.write().await;
        if guard.is_none() {
            *guard = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn recreate_collection(&self) -> StoreResult<()> {
        *self.docs.write().await = Some(BTreeMap::new());
        Ok(())
    }
}
