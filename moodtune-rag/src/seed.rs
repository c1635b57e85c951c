//! Knowledge-base seeding
//!
//! Fills the store with curator suggestions for every known emotion,
//! resolved against the catalog. Used by the admin endpoints and by the
//! startup auto-seed when the store is empty.

use crate::outcome::{guarded, Outcome};
use crate::pipeline::augment::{guidance_for, GENERATED_SOURCE};
use crate::pipeline::{merge_candidates, RagPipeline};
use crate::types::SongPair;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Pairs per resolve-batch request
pub const RESOLVE_CHUNK: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub indexed: usize,
    pub by_emotion: BTreeMap<String, usize>,
    pub source: String,
}

impl RagPipeline {
    /// Seed `per_emotion` suggestions for each emotion in the table
    ///
    /// A failure for one emotion leaves its count at 0 and moves on.
    pub async fn seed_knowledge(&self, per_emotion: usize) -> SeedReport {
        let mut report = SeedReport {
            source: GENERATED_SOURCE.to_string(),
            ..SeedReport::default()
        };
        let timeout = self.config().call_timeout;

        if let Outcome::Degraded(reason) =
            guarded("store.ensure_collection", timeout, self.store().ensure_collection()).await
        {
            warn!(reason = %reason, "Seeding without a confirmed collection");
        }

        for emotion in self.emotions().labels() {
            let indexed = self.seed_emotion(&emotion, per_emotion).await;
            report.indexed += indexed;
            report.by_emotion.insert(emotion, indexed);
        }

        info!(indexed = report.indexed, emotions = report.by_emotion.len(), "Seeding finished");
        report
    }

    /// Drop every document, then seed again
    pub async fn rebuild(&self, per_emotion: usize) -> SeedReport {
        let timeout = self.config().call_timeout;
        if let Outcome::Degraded(reason) =
            guarded("store.recreate_collection", timeout, self.store().recreate_collection()).await
        {
            warn!(reason = %reason, "Collection recreation failed, seeding over existing data");
        }
        self.seed_knowledge(per_emotion).await
    }

    async fn seed_emotion(&self, emotion: &str, per_emotion: usize) -> usize {
        if per_emotion == 0 {
            return 0;
        }
        let timeout = self.config().call_timeout;
        let params = self.emotions().params(emotion);
        let guidance = guidance_for(&params);

        let suggestions = match guarded(
            "curator.curate",
            timeout,
            self.curator().curate(emotion, per_emotion, &[], &guidance),
        )
        .await
        {
            Outcome::Success(suggestions) => suggestions,
            Outcome::Degraded(_) => return 0,
        };
        let pairs: Vec<SongPair> = suggestions.iter().filter_map(SongPair::cleaned).collect();

        let mut resolved = Vec::new();
        for chunk in pairs.chunks(RESOLVE_CHUNK) {
            if let Outcome::Success(mut tracks) = guarded(
                "catalog.resolve_batch",
                timeout,
                self.catalog().resolve_batch(chunk, 1),
            )
            .await
            {
                resolved.append(&mut tracks);
            }
        }

        let described = self.describe(resolved, emotion, &params).await;
        let unique = merge_candidates(&[described.as_slice()], described.len());

        let indexed = self.normalize_and_index(unique, emotion).await;
        info!(emotion, suggested = pairs.len(), indexed, "Emotion seeded");
        indexed
    }
}
