//! Store retrieval with bounded range relaxation

use super::{merge_candidates, presentation_cap, RagPipeline};
use crate::budget::RoundBudget;
use crate::outcome::guarded;
use crate::store::MoodQuery;
use crate::types::TrackCandidate;
use tracing::debug;

impl RagPipeline {
    /// Entries tagged with `emotion` whose metrics fall in its ranges
    ///
    /// Widens both ranges by the relaxation step after each short query, for
    /// at most `max_relax_steps + 1` queries. Returns the first result with at
    /// least `min_count` entries, otherwise the last (most relaxed) one.
    /// A failed query counts as zero results. Store documents sharing a
    /// (title, artist) key count once; the first hit wins.
    pub async fn retrieve(
        &self,
        emotion: &str,
        min_count: usize,
        max_relax_steps: u32,
    ) -> Vec<TrackCandidate> {
        let cap = presentation_cap(min_count);
        let mut params = self.emotions.params(emotion);
        let mut budget = RoundBudget::with_relaxation(max_relax_steps);
        let mut last = Vec::new();

        while let Some(attempt) = budget.next_round() {
            let query = MoodQuery::new(emotion, params.valence, params.energy, cap);
            let raw = guarded(
                "store.search",
                self.config.call_timeout,
                self.store.search(&query),
            )
            .await
            .unwrap_or_default();
            let hits = merge_candidates(&[raw.as_slice()], cap);

            debug!(
                emotion,
                attempt,
                count = hits.len(),
                dropped = raw.len() - hits.len(),
                valence_lo = params.valence.lo,
                valence_hi = params.valence.hi,
                energy_lo = params.energy.lo,
                energy_hi = params.energy.hi,
                "Retrieval round"
            );

            if hits.len() >= min_count {
                return hits;
            }
            last = hits;
            params = params.relax(self.config.relax_step);
        }

        last
    }
}
