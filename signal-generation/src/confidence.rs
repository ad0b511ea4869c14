// Confidence Composition
// Base score from anomaly magnitude, then named multiplicative modifiers.
// Multiplication is commutative so modifier order never changes the result,
// and every application is recorded for the audit trail.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::signals::{ConfidenceLevel, ConfidenceModifier, ConfidenceScore};
use crate::timing::{TimingCategory, TimingWeights};

/// Base confidence from an anomaly magnitude.
///
/// At or above the high threshold the base caps at 0.9; between the two
/// thresholds it interpolates linearly across [0.6, 0.9); below the minimum
/// it falls back to 0.5. Such candidates should already have been gated out
/// upstream.
pub fn base_confidence(magnitude: f64, min_threshold: f64, high_threshold: f64) -> f64 {
    if magnitude >= high_threshold {
        0.9
    } else if magnitude >= min_threshold && high_threshold > min_threshold {
        0.6 + 0.3 * (magnitude - min_threshold) / (high_threshold - min_threshold)
    } else {
        0.5
    }
}

/// Credibility weight per book, with a default for unknown books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookWeights {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl BookWeights {
    pub fn new(weights: HashMap<String, f64>, default_weight: f64) -> Self {
        Self {
            weights,
            default_weight,
        }
    }

    pub fn weight(&self, book: &str) -> f64 {
        self.weights
            .get(book)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

impl Default for BookWeights {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert("Pinnacle".to_string(), 1.15);
        weights.insert("Circa".to_string(), 1.12);
        weights.insert("BetOnline".to_string(), 1.05);
        weights.insert("Bookmaker".to_string(), 1.05);
        weights.insert("DraftKings".to_string(), 1.00);
        weights.insert("FanDuel".to_string(), 1.00);
        weights.insert("BetMGM".to_string(), 0.98);
        weights.insert("Caesars".to_string(), 0.98);
        Self::new(weights, 0.95)
    }
}

/// Reliability weight bucketed by observation volume (ticket count)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeWeights {
    /// (exclusive upper cutoff, weight), ascending by cutoff
    buckets: Vec<(u32, f64)>,
    /// Weight at or above the last cutoff
    top: f64,
}

impl VolumeWeights {
    pub fn new(buckets: Vec<(u32, f64)>, top: f64) -> Self {
        Self { buckets, top }
    }

    pub fn weight(&self, volume: u32) -> f64 {
        for (cutoff, weight) in &self.buckets {
            if volume < *cutoff {
                return *weight;
            }
        }
        self.top
    }
}

impl Default for VolumeWeights {
    fn default() -> Self {
        Self::new(
            vec![(100, 0.85), (500, 0.95), (1000, 1.00), (5000, 1.05)],
            1.10,
        )
    }
}

/// Immutable weight tables shared by every detector run.
///
/// Pure: safe to call from arbitrarily many concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceComposer {
    books: BookWeights,
    volumes: VolumeWeights,
    timing: TimingWeights,
}

impl ConfidenceComposer {
    pub fn new(books: BookWeights, volumes: VolumeWeights, timing: TimingWeights) -> Self {
        Self {
            books,
            volumes,
            timing,
        }
    }

    /// Start a composition from a detector's anomaly magnitude and thresholds
    pub fn begin(&self, magnitude: f64, min_threshold: f64, high_threshold: f64) -> Composition<'_> {
        Composition {
            composer: self,
            base: base_confidence(magnitude, min_threshold, high_threshold),
            modifiers: Vec::new(),
        }
    }
}

/// One in-flight composition; consumed by `finish`
#[derive(Debug)]
pub struct Composition<'a> {
    composer: &'a ConfidenceComposer,
    base: f64,
    modifiers: Vec<ConfidenceModifier>,
}

impl Composition<'_> {
    fn push(mut self, name: String, multiplier: f64) -> Self {
        self.modifiers.push(ConfidenceModifier { name, multiplier });
        self
    }

    /// Book-credibility weight, by book name
    pub fn book(self, book: &str) -> Self {
        let multiplier = self.composer.books.weight(book);
        self.push("book_credibility".to_string(), multiplier)
    }

    /// Volume-reliability weight, bucketed by ticket count
    pub fn volume(self, volume: u32) -> Self {
        let multiplier = self.composer.volumes.weight(volume);
        self.push("volume_reliability".to_string(), multiplier)
    }

    /// Timing-category weight from the shared table
    pub fn timing(self, category: TimingCategory) -> Self {
        let multiplier = self.composer.timing.multiplier(category);
        self.push("timing".to_string(), multiplier)
    }

    /// Detector-specific named bonus (or penalty; any multiplier >= 0)
    pub fn bonus(self, name: &str, multiplier: f64) -> Self {
        self.push(name.to_string(), multiplier.max(0.0))
    }

    /// Apply all modifiers and clamp into [0, 1]
    pub fn finish(self) -> ConfidenceScore {
        let product: f64 = self.modifiers.iter().map(|m| m.multiplier).product();
        let score = (self.base * product).clamp(0.0, 1.0);
        debug!(
            base = self.base,
            modifiers = self.modifiers.len(),
            score,
            "composed confidence"
        );
        ConfidenceScore {
            score,
            level: ConfidenceLevel::from_score(score),
            modifiers: self.modifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_caps_at_high_threshold() {
        assert_eq!(base_confidence(26.0, 8.0, 20.0), 0.9);
        assert_eq!(base_confidence(20.0, 8.0, 20.0), 0.9);
    }

    #[test]
    fn test_base_interpolates_between_thresholds() {
        let mid = base_confidence(14.0, 8.0, 20.0);
        assert!((mid - 0.75).abs() < 1e-9);
        assert_eq!(base_confidence(8.0, 8.0, 20.0), 0.6);
    }

    #[test]
    fn test_base_falls_back_below_min() {
        assert_eq!(base_confidence(5.0, 8.0, 20.0), 0.5);
    }

    #[test]
    fn test_unknown_book_gets_default_weight() {
        let books = BookWeights::default();
        assert_eq!(books.weight("CornerStoreBook"), 0.95);
        assert_eq!(books.weight("Pinnacle"), 1.15);
    }

    #[test]
    fn test_volume_buckets() {
        let volumes = VolumeWeights::default();
        assert_eq!(volumes.weight(50), 0.85);
        assert_eq!(volumes.weight(100), 0.95);
        assert_eq!(volumes.weight(750), 1.00);
        assert_eq!(volumes.weight(9000), 1.10);
    }

    #[test]
    fn test_modifier_trail_is_recorded() {
        let composer = ConfidenceComposer::default();
        let score = composer
            .begin(26.0, 8.0, 20.0)
            .book("Pinnacle")
            .volume(750)
            .timing(TimingCategory::UltraLate)
            .finish();

        let names: Vec<&str> = score.modifiers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["book_credibility", "volume_reliability", "timing"]);
        assert_eq!(score.score, 1.0);
        assert_eq!(score.level, ConfidenceLevel::High);
    }

    #[test]
    fn test_zero_multiplier_floors_at_zero() {
        let composer = ConfidenceComposer::default();
        let score = composer.begin(26.0, 8.0, 20.0).bonus("dead_market", 0.0).finish();
        assert_eq!(score.score, 0.0);
        assert_eq!(score.level, ConfidenceLevel::Low);
    }

    proptest! {
        #[test]
        fn prop_final_score_always_in_unit_interval(
            magnitude in 0.0f64..100.0,
            min_t in 0.1f64..20.0,
            spread in 0.1f64..50.0,
            volume in 0u32..20_000,
            book_idx in 0usize..5,
            bonuses in prop::collection::vec(0.0f64..3.0, 0..6),
        ) {
            let books = ["Pinnacle", "FanDuel", "Caesars", "NoNameBook", "Circa"];
            let composer = ConfidenceComposer::default();
            let mut composition = composer
                .begin(magnitude, min_t, min_t + spread)
                .book(books[book_idx])
                .volume(volume)
                .timing(TimingCategory::classify((magnitude * 50.0) as i64));
            for (i, b) in bonuses.iter().enumerate() {
                composition = composition.bonus(&format!("bonus_{i}"), *b);
            }
            let score = composition.finish();
            prop_assert!(score.score >= 0.0);
            prop_assert!(score.score <= 1.0);
        }
    }
}
