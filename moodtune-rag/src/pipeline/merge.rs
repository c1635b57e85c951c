//! Priority-preserving merge

use crate::types::{KeySet, TrackCandidate};

/// Merge lists in priority order, dropping duplicate keys
///
/// Entries keep the position of their first occurrence. Entries without a
/// key are skipped. Stops as soon as `target` entries are collected.
pub fn merge_candidates(lists: &[&[TrackCandidate]], target: usize) -> Vec<TrackCandidate> {
    let mut merged = Vec::new();
    if target == 0 {
        return merged;
    }
    let mut seen = KeySet::new();

    for list in lists {
        for candidate in list.iter() {
            let Some(key) = candidate.key() else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            merged.push(candidate.clone());
            if merged.len() >= target {
                return merged;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artist: &str, source: &str) -> TrackCandidate {
        TrackCandidate {
            source: Some(source.to_string()),
            ..TrackCandidate::new(title, artist)
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let store = vec![track("Hey Jude", "The Beatles", "store")];
        let generated = vec![
            track("hey jude ", "THE BEATLES", "generated"),
            track("Let It Be", "The Beatles", "generated"),
        ];
        let merged = merge_candidates(&[store.as_slice(), generated.as_slice()], 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source.as_deref(), Some("store"));
        assert_eq!(merged[1].title, "Let It Be");
    }

    #[test]
    fn test_stops_at_target() {
        let list: Vec<_> = (0..10).map(|i| track(&format!("Song {}", i), "A", "x")).collect();
        let merged = merge_candidates(&[list.as_slice()], 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].title, "Song 2");
        assert!(merge_candidates(&[list.as_slice()], 0).is_empty());
    }

    #[test]
    fn test_keyless_entries_are_skipped() {
        let list = vec![track("", "Artist", "x"), track("Title", " ", "x"), track("T", "A", "x")];
        let merged = merge_candidates(&[list.as_slice()], 5);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_output_has_unique_keys() {
        let a = vec![track("X", "Y", "a"), track("x", "y", "a")];
        let b = vec![track("X ", " Y", "b"), track("Z", "Y", "b")];
        let merged = merge_candidates(&[a.as_slice(), b.as_slice()], 100);
        let keys = KeySet::from_candidates(&merged);
        assert_eq!(keys.len(), merged.len());
        assert_eq!(merged.len(), 2);
    }
}
