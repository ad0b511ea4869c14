// Hybrid Sharp Detector
// Flags markets where a money/ticket differential and line movement point
// the same way; either signal alone is weaker than the two corroborating

use chrono::Utc;
use common::{BetType, BettingSplit, DataSource, GameRecord, LineSnapshot, MarketDataRepository};
use std::sync::Arc;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_snapshot, validate_split};

const NAME: &str = "hybrid_sharp";
const MARKETS: [BetType; 2] = [BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct HybridSharpConfig {
    /// Component floors; both must clear before anything combines
    pub min_differential: f64,
    pub min_move: f64,
    /// Weights of the combined magnitude
    pub differential_weight: f64,
    pub movement_weight: f64,
    /// Points of line travel equivalent to one percentage point of
    /// differential
    pub movement_scale: f64,
    /// Combined magnitude thresholds
    pub min_combined: f64,
    pub high_combined: f64,
    pub alignment_bonus: f64,
    pub min_volume: u32,
    pub max_signals: usize,
}

impl Default for HybridSharpConfig {
    fn default() -> Self {
        Self {
            min_differential: 6.0,
            min_move: 0.5,
            differential_weight: 0.6,
            movement_weight: 0.4,
            movement_scale: 5.0,
            min_combined: 8.0,
            high_combined: 20.0,
            alignment_bonus: 1.10,
            min_volume: 100,
            max_signals: 6,
        }
    }
}

/// Detects sharp differential corroborated by line movement
pub struct HybridSharpDetector {
    config: HybridSharpConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl HybridSharpDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(HybridSharpConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: HybridSharpConfig,
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self {
            config,
            repository,
            composer,
        }
    }

    fn analyze_market(
        &self,
        game: &GameRecord,
        bet_type: BetType,
        minutes_to_game: i64,
        timing: TimingCategory,
        splits: &[BettingSplit],
        lines: &[LineSnapshot],
    ) -> Result<Vec<Signal>, CandidateError> {
        // Sharpest split across books
        let latest = support::latest_splits(splits, &game.game_id, bet_type);
        let mut sharpest: Option<&BettingSplit> = None;
        for split in latest {
            validate_split(split)?;
            if split.volume < self.config.min_volume {
                continue;
            }
            let differential = (split.money_percentage - split.bet_percentage).abs();
            if differential < self.config.min_differential {
                continue;
            }
            match sharpest {
                Some(s) if (s.money_percentage - s.bet_percentage).abs() >= differential => {}
                _ => sharpest = Some(split),
            }
        }
        let Some(split) = sharpest else {
            return Ok(Vec::new());
        };
        let differential = split.money_percentage - split.bet_percentage;

        // Largest aligned line move across books
        let paths = support::book_paths(lines, &game.game_id, bet_type);
        let mut best_delta = 0.0f64;
        for (open, current) in paths.values() {
            validate_snapshot(open)?;
            validate_snapshot(current)?;
            let delta = current.line - open.line;
            if delta.abs() > best_delta.abs() {
                best_delta = delta;
            }
        }
        if best_delta.abs() < self.config.min_move {
            return Ok(Vec::new());
        }

        let money_side = if differential >= 0.0 {
            support::home_side(bet_type)
        } else {
            support::home_side(bet_type).opposite()
        };
        let move_side = support::moved_toward(bet_type, best_delta);
        if money_side != move_side {
            return Ok(Vec::new());
        }

        let combined = self.config.differential_weight * differential.abs()
            + self.config.movement_weight * best_delta.abs() * self.config.movement_scale;
        if combined < self.config.min_combined {
            return Ok(Vec::new());
        }

        let confidence = self
            .composer
            .begin(combined, self.config.min_combined, self.config.high_combined)
            .book(&split.book)
            .volume(split.volume)
            .timing(timing)
            .bonus("sharp_move_alignment", self.config.alignment_bonus)
            .finish();

        Ok(vec![Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::HybridSharp,
            category: StrategyCategory::Hybrid,
            game_id: game.game_id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            game_time: game.game_time,
            side: money_side,
            bet_type,
            confidence,
            raw_strength: combined,
            minutes_to_game,
            timing,
            source: DataSource::BettingSplits,
            books: vec![split.book.clone()],
            payload: SignalPayload {
                magnitude: combined,
                detail: PayloadDetail::HybridSharp {
                    differential,
                    line_delta: best_delta,
                    combined,
                },
            },
            created_at: Utc::now(),
            detector_version: self.version().to_string(),
        }])
    }

    fn analyze_game(
        &self,
        game: &GameRecord,
        minutes_to_game: i64,
        splits: &[BettingSplit],
        lines: &[LineSnapshot],
        tally: &mut RunTally,
    ) -> Result<Vec<Signal>, CandidateError> {
        validate_game(game)?;

        let timing = TimingCategory::classify(minutes_to_game);
        let mut signals = Vec::new();
        for bet_type in MARKETS {
            match self.analyze_market(game, bet_type, minutes_to_game, timing, splits, lines) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip_market(NAME, &game.game_id, bet_type, &e),
            }
        }

        Ok(signals)
    }
}

#[async_trait::async_trait]
impl Detector for HybridSharpDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::HybridSharp
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Hybrid
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::BettingSplits, DataSource::LineHistory]
    }

    fn description(&self) -> &'static str {
        "Sharp differential corroborated by aligned line movement"
    }

    fn version(&self) -> &'static str {
        "1.1"
    }

    fn max_signals(&self) -> usize {
        self.config.max_signals
    }

    async fn process_signals(
        &self,
        games: &[GameRecord],
        ctx: &ProcessingContext,
    ) -> Result<DetectorOutput, RunFailure> {
        let eligible: Vec<(&GameRecord, i64)> = games
            .iter()
            .filter_map(|g| ctx.eligible(g.game_time).map(|m| (g, m)))
            .collect();
        if eligible.is_empty() {
            return Ok(DetectorOutput::default());
        }

        let ids: Vec<String> = eligible.iter().map(|(g, _)| g.game_id.clone()).collect();
        let splits = self
            .repository
            .betting_splits(&ids)
            .await
            .map_err(|e| RunFailure::new(NAME, e))?;
        let lines = self
            .repository
            .line_history(&ids)
            .await
            .map_err(|e| RunFailure::new(NAME, e))?;

        let mut tally = RunTally::default();
        let mut signals = Vec::new();
        for (game, minutes) in eligible {
            tally.saw_candidate();
            match self.analyze_game(game, minutes, &splits, &lines, &mut tally) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip(NAME, &game.game_id, &e),
            }
        }

        Ok(DetectorOutput::new(signals, tally))
    }
}
