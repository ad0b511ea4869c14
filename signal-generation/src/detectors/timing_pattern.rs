// Timing Pattern Detector
// Flags markets where line movement clusters in the late window before the
// game rather than spreading evenly since the open

use chrono::{Duration, Utc};
use common::{BetType, DataSource, GameRecord, LineSnapshot, MarketDataRepository};
use std::sync::Arc;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_snapshot};

const NAME: &str = "timing_pattern";
const MARKETS: [BetType; 2] = [BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct TimingPatternConfig {
    /// Movement inside this many minutes before kickoff counts as late
    pub late_window_minutes: i64,
    /// Share of total movement that must fall in the late window
    pub min_late_share: f64,
    /// Total absolute movement below this is noise regardless of shape
    pub min_total_move: f64,
    /// Magnitude thresholds for confidence (late share times total move)
    pub min_magnitude: f64,
    pub high_magnitude: f64,
    /// Late share at or above this earns the surge bonus
    pub surge_share: f64,
    pub surge_bonus: f64,
    pub max_signals: usize,
}

impl Default for TimingPatternConfig {
    fn default() -> Self {
        Self {
            late_window_minutes: 120,
            min_late_share: 0.6,
            min_total_move: 1.0,
            min_magnitude: 1.0,
            high_magnitude: 3.0,
            surge_share: 0.85,
            surge_bonus: 1.08,
            max_signals: 8,
        }
    }
}

/// Detects late-window concentration of line movement
pub struct TimingPatternDetector {
    config: TimingPatternConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl TimingPatternDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(TimingPatternConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: TimingPatternConfig,
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
        lines: &[LineSnapshot],
    ) -> Result<Vec<Signal>, CandidateError> {
        let late_cutoff = game.game_time - Duration::minutes(self.config.late_window_minutes);

        let books = support::book_paths(lines, &game.game_id, bet_type);
        let mut total_move = 0.0;
        let mut late_move = 0.0;
        let mut late_net = 0.0;
        let mut sampled: Vec<String> = Vec::new();

        for book in books.keys() {
            let path = support::line_path(lines, &game.game_id, bet_type, book);
            for snap in &path {
                validate_snapshot(snap)?;
            }
            for pair in path.windows(2) {
                let step = pair[1].line - pair[0].line;
                total_move += step.abs();
                if pair[1].recorded_at >= late_cutoff {
                    late_move += step.abs();
                    late_net += step;
                }
            }
            sampled.push(book.to_string());
        }

        if total_move < self.config.min_total_move {
            return Ok(Vec::new());
        }
        let late_share = late_move / total_move;
        if late_share < self.config.min_late_share {
            return Ok(Vec::new());
        }

        let magnitude = total_move * late_share;
        if magnitude < self.config.min_magnitude {
            return Ok(Vec::new());
        }

        let side = support::moved_toward(bet_type, late_net);

        let mut composition = self
            .composer
            .begin(
                magnitude,
                self.config.min_magnitude,
                self.config.high_magnitude,
            )
            .timing(timing);
        if late_share >= self.config.surge_share {
            composition = composition.bonus("late_surge", self.config.surge_bonus);
        }
        let confidence = composition.finish();

        sampled.sort();
        Ok(vec![Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::TimingPattern,
            category: StrategyCategory::Timing,
            game_id: game.game_id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            game_time: game.game_time,
            side,
            bet_type,
            confidence,
            raw_strength: magnitude,
            minutes_to_game,
            timing,
            source: DataSource::LineHistory,
            books: sampled,
            payload: SignalPayload {
                magnitude,
                detail: PayloadDetail::TimingPattern {
                    total_movement: total_move,
                    late_movement: late_move,
                    late_share,
                    window_minutes: self.config.late_window_minutes,
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
        lines: &[LineSnapshot],
        tally: &mut RunTally,
    ) -> Result<Vec<Signal>, CandidateError> {
        validate_game(game)?;

        let timing = TimingCategory::classify(minutes_to_game);
        let mut signals = Vec::new();
        for bet_type in MARKETS {
            match self.analyze_market(game, bet_type, minutes_to_game, timing, lines) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip_market(NAME, &game.game_id, bet_type, &e),
            }
        }

        Ok(signals)
    }
}

#[async_trait::async_trait]
impl Detector for TimingPatternDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::TimingPattern
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Timing
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::LineHistory]
    }

    fn description(&self) -> &'static str {
        "Line movement concentrated in the late window before kickoff"
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
        let lines = self
            .repository
            .line_history(&ids)
            .await
            .map_err(|e| RunFailure::new(NAME, e))?;

        let mut tally = RunTally::default();
        let mut signals = Vec::new();
        for (game, minutes) in eligible {
            tally.saw_candidate();
            match self.analyze_game(game, minutes, &lines, &mut tally) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip(NAME, &game.game_id, &e),
            }
        }

        Ok(DetectorOutput::new(signals, tally))
    }
}
