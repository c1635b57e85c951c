//! Emotion parameters and range relaxation
//!
//! Maps an emotion label to closed (valence, energy) acceptance ranges and
//! widens them when strict filtering under-returns.

use moodtune_common::config::EmotionRangeConfig;
use moodtune_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Range used for both axes when an emotion label is unknown
pub const NEUTRAL_RANGE: ValueRange = ValueRange { lo: 0.4, hi: 0.6 };

/// A closed range `lo <= hi` within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub lo: f64,
    pub hi: f64,
}

impl ValueRange {
    /// Validated constructor
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(Error::Config(format!(
                "Invalid range [{}, {}]: expected 0 <= lo <= hi <= 1",
                lo, hi
            )));
        }
        Ok(Self { lo, hi })
    }

    /// Midpoint rounded to 2 decimals
    pub fn midpoint(&self) -> f64 {
        round2((self.lo + self.hi) / 2.0)
    }

    /// Widen symmetrically by `step` within [0, 1]
    pub fn relax(&self, step: f64) -> Self {
        relax_range(*self, step, 0.0, 1.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// Widen `range` by `step` on both sides, clamped to `[min_val, max_val]`
pub fn relax_range(range: ValueRange, step: f64, min_val: f64, max_val: f64) -> ValueRange {
    ValueRange {
        lo: min_val.max(range.lo - step),
        hi: max_val.min(range.hi + step),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Acceptance ranges for one emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionParams {
    pub valence: ValueRange,
    pub energy: ValueRange,
}

impl EmotionParams {
    pub const NEUTRAL: EmotionParams = EmotionParams {
        valence: NEUTRAL_RANGE,
        energy: NEUTRAL_RANGE,
    };

    /// Both ranges widened by `step`
    pub fn relax(&self, step: f64) -> Self {
        Self {
            valence: self.valence.relax(step),
            energy: self.energy.relax(step),
        }
    }

    /// (valence midpoint, energy midpoint), each rounded to 2 decimals
    pub fn midpoints(&self) -> (f64, f64) {
        (self.valence.midpoint(), self.energy.midpoint())
    }
}

impl TryFrom<&EmotionRangeConfig> for EmotionParams {
    type Error = Error;

    fn try_from(config: &EmotionRangeConfig) -> Result<Self> {
        Ok(Self {
            valence: ValueRange::new(config.valence[0], config.valence[1])?,
            energy: ValueRange::new(config.energy[0], config.energy[1])?,
        })
    }
}

/// Process-wide emotion → parameters table (read-only after startup)
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionTable {
    entries: BTreeMap<String, EmotionParams>,
}

impl Default for EmotionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EmotionTable {
    /// Compiled defaults
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        let mut add = |label: &str, v: (f64, f64), e: (f64, f64)| {
            entries.insert(
                label.to_string(),
                EmotionParams {
                    valence: ValueRange { lo: v.0, hi: v.1 },
                    energy: ValueRange { lo: e.0, hi: e.1 },
                },
            );
        };
        add("happy", (0.6, 1.0), (0.5, 1.0));
        add("sad", (0.0, 0.4), (0.0, 0.5));
        add("angry", (0.2, 0.6), (0.6, 1.0));
        add("relaxed", (0.5, 1.0), (0.0, 0.5));
        Self { entries }
    }

    /// Build from explicit entries; labels are lower-cased
    pub fn from_entries(entries: impl IntoIterator<Item = (String, EmotionParams)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(label, params)| (label.trim().to_lowercase(), params))
                .collect(),
        }
    }

    /// Build from the `[emotions]` config section, validating every range.
    /// An empty section yields the compiled defaults.
    pub fn from_config(config: &BTreeMap<String, EmotionRangeConfig>) -> Result<Self> {
        if config.is_empty() {
            return Ok(Self::builtin());
        }
        let mut entries = Vec::with_capacity(config.len());
        for (label, ranges) in config {
            let params = EmotionParams::try_from(ranges)
                .map_err(|e| Error::Config(format!("emotion '{}': {}", label, e)))?;
            entries.push((label.clone(), params));
        }
        Ok(Self::from_entries(entries))
    }

    /// Parameters for `label` (case-insensitive), or the neutral default
    pub fn params(&self, label: &str) -> EmotionParams {
        self.entries
            .get(&label.trim().to_lowercase())
            .copied()
            .unwrap_or(EmotionParams::NEUTRAL)
    }

    /// (valence, energy) midpoints for `label`
    pub fn midpoints(&self, label: &str) -> (f64, f64) {
        self.params(label).midpoints()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(&label.trim().to_lowercase())
    }

    /// Known labels, sorted
    pub fn labels(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_label_gets_neutral_default() {
        let table = EmotionTable::builtin();
        let params = table.params("unknown_label");
        assert_eq!(params.valence, ValueRange { lo: 0.4, hi: 0.6 });
        assert_eq!(params.energy, ValueRange { lo: 0.4, hi: 0.6 });
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = EmotionTable::builtin();
        assert_eq!(table.params("HAPPY"), table.params("happy"));
        assert_eq!(table.params(" Sad ").valence, ValueRange { lo: 0.0, hi: 0.4 });
    }

    #[test]
    fn test_midpoints_are_rounded() {
        let params = EmotionTable::builtin().params("happy");
        assert_eq!(params.midpoints(), (0.8, 0.75));
        let relaxed = EmotionTable::builtin().params("relaxed");
        assert_eq!(relaxed.midpoints(), (0.75, 0.25));
        assert_eq!(EmotionTable::builtin().midpoints("unknown_label"), (0.5, 0.5));
    }

    #[test]
    fn test_relax_clamps_to_unit_interval() {
        let range = ValueRange { lo: 0.05, hi: 0.95 };
        let relaxed = range.relax(0.1);
        assert_eq!(relaxed.lo, 0.0);
        assert_eq!(relaxed.hi, 1.0);
    }

    #[test]
    fn test_relaxation_is_monotonic_and_bounded() {
        let mut range = ValueRange { lo: 0.4, hi: 0.6 };
        for _ in 0..20 {
            let next = range.relax(0.1);
            assert!(next.lo <= range.lo);
            assert!(next.hi >= range.hi);
            assert!(next.lo >= 0.0 && next.hi <= 1.0);
            range = next;
        }
        assert_eq!(range, ValueRange { lo: 0.0, hi: 1.0 });
    }

    #[test]
    fn test_relax_range_custom_bounds() {
        let relaxed = relax_range(ValueRange { lo: 0.3, hi: 0.5 }, 0.2, 0.2, 0.6);
        assert_eq!(relaxed, ValueRange { lo: 0.2, hi: 0.6 });
    }

    #[test]
    fn test_value_range_validation() {
        assert!(ValueRange::new(0.2, 0.8).is_ok());
        assert!(ValueRange::new(0.8, 0.2).is_err());
        assert!(ValueRange::new(-0.1, 0.5).is_err());
        assert!(ValueRange::new(0.5, 1.5).is_err());
    }

    #[test]
    fn test_from_config_validates_and_lowercases() {
        let mut config = BTreeMap::new();
        config.insert(
            "Calm".to_string(),
            EmotionRangeConfig {
                valence: [0.4, 0.8],
                energy: [0.0, 0.3],
            },
        );
        let table = EmotionTable::from_config(&config).unwrap();
        assert!(table.contains("calm"));
        assert!(!table.contains("happy"));

        config.insert(
            "broken".to_string(),
            EmotionRangeConfig {
                valence: [0.9, 0.1],
                energy: [0.0, 0.3],
            },
        );
        assert!(EmotionTable::from_config(&config).is_err());
    }

    #[test]
    fn test_empty_config_uses_builtin() {
        let table = EmotionTable::from_config(&BTreeMap::new()).unwrap();
        assert_eq!(table.labels(), vec!["angry", "happy", "relaxed", "sad"]);
    }
}
