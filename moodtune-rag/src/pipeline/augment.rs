//! Generative augmentation
//!
//! Asks the curator for new suggestions, filters out anything already known
//! (request avoid set or store lookup), resolves the survivors against the
//! catalog and attaches audio descriptors.

use super::RagPipeline;
use crate::budget::RoundBudget;
use crate::catalog::ResolvedTrack;
use crate::emotion::EmotionParams;
use crate::outcome::{guarded, Outcome};
use crate::types::{KeySet, SongPair, TrackCandidate};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Provenance tag for curator-suggested, catalog-resolved entries
pub const GENERATED_SOURCE: &str = "llm+music";

/// Steering text handed to the curator alongside the avoid-list
pub fn guidance_for(params: &EmotionParams) -> String {
    let (valence_mid, energy_mid) = params.midpoints();
    format!(
        "valence~{:.2} ({:.2}-{:.2}), energy~{:.2} ({:.2}-{:.2}). \
         Avoid exact duplicates of known title+artist.",
        valence_mid,
        params.valence.lo,
        params.valence.hi,
        energy_mid,
        params.energy.lo,
        params.energy.hi
    )
}

impl RagPipeline {
    /// Up to `desired_count` new candidates for `emotion`
    ///
    /// No returned candidate collides with `existing` or with an entry the
    /// store already holds. Keys of every accepted suggestion and of every
    /// store hit found along the way are added to `existing`.
    pub async fn augment(
        &self,
        emotion: &str,
        existing: &mut KeySet,
        desired_count: usize,
    ) -> Vec<TrackCandidate> {
        if desired_count == 0 {
            return Vec::new();
        }
        let params = self.emotions.params(emotion);
        let guidance = guidance_for(&params);
        let timeout = self.config.call_timeout;
        // Keys that resolved entries must not collide with: everything known
        // before this call plus store hits. Accepted suggestions are excluded.
        let mut blocked = existing.clone();

        let mut pending: Vec<SongPair> = Vec::new();
        let mut budget = RoundBudget::new(self.config.augment_rounds);

        while pending.len() < desired_count {
            let Some(round) = budget.next_round() else {
                break;
            };
            let avoid = existing.avoid_list(self.config.avoid_cap);

            let suggestions = match guarded(
                "curator.curate",
                timeout,
                self.curator.curate(emotion, desired_count, &avoid, &guidance),
            )
            .await
            {
                Outcome::Success(suggestions) => suggestions,
                Outcome::Degraded(_) => break,
            };

            let mut accepted = 0;
            for suggestion in suggestions {
                let Some(pair) = suggestion.cleaned() else {
                    continue;
                };
                let Some(key) = pair.key() else {
                    continue;
                };
                if existing.contains(&key) {
                    continue;
                }

                let known = guarded(
                    "store.find_by_title_artist",
                    timeout,
                    self.store.find_by_title_artist(&pair.title, &pair.artist, 1),
                )
                .await
                .unwrap_or_default();

                if !known.is_empty() {
                    blocked.insert(key.clone());
                    existing.insert(key);
                    continue;
                }
                existing.insert(key);

                pending.push(pair);
                accepted += 1;
                if pending.len() >= desired_count {
                    break;
                }
            }

            debug!(emotion, round, accepted, pending = pending.len(), desired_count, "Augmentation round");
        }

        if pending.is_empty() {
            return Vec::new();
        }

        let resolved = match guarded(
            "catalog.resolve_batch",
            timeout,
            self.catalog.resolve_batch(&pending, 1),
        )
        .await
        {
            Outcome::Success(resolved) => resolved,
            Outcome::Degraded(_) => return Vec::new(),
        };

        let described = self.describe(resolved, emotion, &params).await;

        // Catalog titles can differ from the suggestion; dedup again on the
        // resolved key and look up any key the store was never asked about
        let mut requested = KeySet::new();
        for key in pending.iter().filter_map(SongPair::key) {
            requested.insert(key);
        }
        let mut seen = blocked;
        let mut found = Vec::new();
        for candidate in described {
            let Some(key) = candidate.key() else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            existing.insert(key.clone());
            if !requested.contains(&key) {
                let known = guarded(
                    "store.find_by_title_artist",
                    timeout,
                    self.store
                        .find_by_title_artist(&candidate.title, &candidate.artist, 1),
                )
                .await
                .unwrap_or_default();
                if !known.is_empty() {
                    debug!(emotion, title = %candidate.title, artist = %candidate.artist, "Resolved track already stored");
                    continue;
                }
            }
            found.push(candidate);
            if found.len() >= desired_count {
                break;
            }
        }

        info!(
            emotion,
            pending = pending.len(),
            found = found.len(),
            rounds = budget.used(),
            exhausted = budget.is_exhausted(),
            "Augmentation finished"
        );
        found
    }

    /// Candidates for resolved tracks, with measured or inferred valence/energy
    pub(crate) async fn describe(
        &self,
        resolved: Vec<ResolvedTrack>,
        emotion: &str,
        params: &EmotionParams,
    ) -> Vec<TrackCandidate> {
        let ids: Vec<String> = resolved
            .iter()
            .filter(|t| t.has_descriptors())
            .filter_map(|t| t.external_id.clone())
            .collect();

        let descriptors = if ids.is_empty() {
            HashMap::new()
        } else {
            guarded(
                "catalog.audio_descriptors",
                self.config.call_timeout,
                self.catalog.audio_descriptors(&ids),
            )
            .await
            .unwrap_or_default()
        };

        let (valence_mid, energy_mid) = params.midpoints();
        let mood = emotion.trim().to_lowercase();
        let mut missing = 0usize;

        let candidates: Vec<TrackCandidate> = resolved
            .into_iter()
            .map(|track| {
                let descriptor = track
                    .external_id
                    .as_ref()
                    .and_then(|id| descriptors.get(id))
                    .copied();
                let mut candidate = track.into_candidate();
                candidate.source = Some(GENERATED_SOURCE.to_string());
                candidate.mood = Some(mood.clone());
                match descriptor {
                    Some(d) => {
                        candidate.valence = d.valence;
                        candidate.energy = d.energy;
                    }
                    None => {
                        missing += 1;
                        candidate.valence = valence_mid;
                        candidate.energy = energy_mid;
                    }
                }
                candidate
            })
            .collect();

        if missing > 0 && !ids.is_empty() {
            warn!(emotion, missing, "Descriptors unavailable, using emotion midpoints");
        }
        candidates
    }
}
