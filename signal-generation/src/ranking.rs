// Filter / Dedup / Rank
// Collapses overlapping candidates to the best signal per key, orders by
// priority and truncates. Deterministic given identical inputs: ties break
// on game id then signal id, never on wall-clock state.

use std::collections::HashMap;
use tracing::debug;

use crate::detector::{DedupKey, Detector};
use crate::signals::Signal;

/// Deduplicate, sort and truncate one detector run's raw output.
///
/// Idempotent: applying it to its own output returns the same list in the
/// same order.
pub fn rank_signals(signals: Vec<Signal>, detector: &dyn Detector) -> Vec<Signal> {
    let raw_count = signals.len();

    let mut best: HashMap<DedupKey, Signal> = HashMap::new();
    for signal in signals {
        let key = detector.dedup_key(&signal);
        match best.get(&key) {
            Some(current) if detector.priority(current) >= detector.priority(&signal) => {}
            _ => {
                best.insert(key, signal);
            }
        }
    }

    let mut survivors: Vec<Signal> = best.into_values().collect();
    survivors.sort_by(|a, b| {
        detector
            .priority(b)
            .partial_cmp(&detector.priority(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.game_id.cmp(&b.game_id))
            .then_with(|| a.id.cmp(&b.id))
    });
    survivors.truncate(detector.max_signals());

    debug!(
        detector = detector.signal_type().as_str(),
        raw = raw_count,
        kept = survivors.len(),
        "ranked signals"
    );
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProcessingContext;
    use crate::detector::DetectorOutput;
    use crate::error::RunFailure;
    use crate::signals::{
        ConfidenceLevel, ConfidenceScore, PayloadDetail, SignalPayload, SignalType,
        StrategyCategory,
    };
    use crate::timing::TimingCategory;
    use chrono::Utc;
    use common::{BetType, DataSource, GameRecord, Side};
    use uuid::Uuid;

    struct StubDetector {
        cap: usize,
    }

    #[async_trait::async_trait]
    impl Detector for StubDetector {
        fn signal_type(&self) -> SignalType {
            SignalType::SharpAction
        }
        fn category(&self) -> StrategyCategory {
            StrategyCategory::SharpMoney
        }
        fn required_data_sources(&self) -> &'static [DataSource] {
            &[DataSource::BettingSplits]
        }
        fn description(&self) -> &'static str {
            "stub"
        }
        fn max_signals(&self) -> usize {
            self.cap
        }
        async fn process_signals(
            &self,
            _games: &[GameRecord],
            _ctx: &ProcessingContext,
        ) -> Result<DetectorOutput, RunFailure> {
            Ok(DetectorOutput::default())
        }
    }

    fn signal(game_id: &str, score: f64) -> Signal {
        Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::SharpAction,
            category: StrategyCategory::SharpMoney,
            game_id: game_id.to_string(),
            home_team: "Home".to_string(),
            away_team: "Away".to_string(),
            game_time: Utc::now(),
            side: Side::Home,
            bet_type: BetType::Spread,
            confidence: ConfidenceScore {
                score,
                level: ConfidenceLevel::from_score(score),
                modifiers: vec![],
            },
            raw_strength: score,
            minutes_to_game: 60,
            timing: TimingCategory::ClosingHour,
            source: DataSource::BettingSplits,
            books: vec!["Pinnacle".to_string()],
            payload: SignalPayload {
                magnitude: score,
                detail: PayloadDetail::Custom(serde_json::json!({})),
            },
            created_at: Utc::now(),
            detector_version: "1.0".to_string(),
        }
    }

    #[test]
    fn test_dedup_keeps_higher_priority() {
        let detector = StubDetector { cap: 10 };
        let ranked = rank_signals(vec![signal("g1", 0.7), signal("g1", 0.9)], &detector);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].confidence.score, 0.9);
    }

    #[test]
    fn test_sorted_descending_and_truncated() {
        let detector = StubDetector { cap: 3 };
        let raw: Vec<Signal> = (0..10)
            .map(|i| signal(&format!("g{i}"), 0.5 + 0.04 * i as f64))
            .collect();
        let ranked = rank_signals(raw, &detector);
        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].confidence.score > ranked[1].confidence.score);
        assert!(ranked[1].confidence.score > ranked[2].confidence.score);
        assert!((ranked[0].confidence.score - 0.86).abs() < 1e-9);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let detector = StubDetector { cap: 5 };
        let raw: Vec<Signal> = (0..8)
            .map(|i| signal(&format!("g{}", i % 4), 0.4 + 0.06 * i as f64))
            .collect();
        let once = rank_signals(raw, &detector);
        let twice = rank_signals(once.clone(), &detector);
        let once_ids: Vec<_> = once.iter().map(|s| s.id).collect();
        let twice_ids: Vec<_> = twice.iter().map(|s| s.id).collect();
        assert_eq!(once_ids, twice_ids);
    }
}
