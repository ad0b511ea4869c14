// Late Flip Detector
// Flags markets where the money-leading side changes hands inside the final
// window before the game

use chrono::{Duration, Utc};
use common::{BetType, BettingSplit, DataSource, GameRecord, MarketDataRepository, Side};
use std::sync::Arc;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_split};

const NAME: &str = "late_flip";
const MARKETS: [BetType; 3] = [BetType::Moneyline, BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct LateFlipConfig {
    /// The flip must complete inside this many minutes before kickoff
    pub flip_window_minutes: i64,
    /// Money-percentage swing thresholds
    pub min_swing: f64,
    pub high_swing: f64,
    /// Ticket volume on the latest observation before it is trusted
    pub min_volume: u32,
    /// Additive ranking bonus when the flip lands ultra late
    pub ultra_late_priority_bonus: f64,
    pub max_signals: usize,
}

impl Default for LateFlipConfig {
    fn default() -> Self {
        Self {
            flip_window_minutes: 180,
            min_swing: 10.0,
            high_swing: 25.0,
            min_volume: 150,
            ultra_late_priority_bonus: 0.05,
            max_signals: 8,
        }
    }
}

/// Detects a late change of the money-leading side
pub struct LateFlipDetector {
    config: LateFlipConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl LateFlipDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(LateFlipConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: LateFlipConfig,
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
    ) -> Result<Vec<Signal>, CandidateError> {
        let window_start = game.game_time - Duration::minutes(self.config.flip_window_minutes);
        let mut signals = Vec::new();

        for book in support::books_for(splits, &game.game_id, bet_type) {
            let history = support::split_history(splits, &game.game_id, bet_type, book);
            for split in &history {
                validate_split(split)?;
            }
            if history.len() < 2 {
                continue;
            }

            let early = history[0];
            let late = history[history.len() - 1];
            if late.recorded_at < window_start || late.volume < self.config.min_volume {
                continue;
            }

            let early_leader = Side::majority_for(bet_type, early.money_percentage);
            let late_leader = Side::majority_for(bet_type, late.money_percentage);
            if early_leader == late_leader {
                continue;
            }

            let swing = (late.money_percentage - early.money_percentage).abs();
            if swing < self.config.min_swing {
                continue;
            }

            let confidence = self
                .composer
                .begin(swing, self.config.min_swing, self.config.high_swing)
                .book(book)
                .volume(late.volume)
                .timing(timing)
                .finish();

            signals.push(Signal {
                id: Uuid::new_v4(),
                signal_type: SignalType::LateFlip,
                category: StrategyCategory::Timing,
                game_id: game.game_id.clone(),
                home_team: game.home_team.clone(),
                away_team: game.away_team.clone(),
                game_time: game.game_time,
                side: late_leader,
                bet_type,
                confidence,
                raw_strength: swing,
                minutes_to_game,
                timing,
                source: DataSource::BettingSplits,
                books: vec![book.to_string()],
                payload: SignalPayload {
                    magnitude: swing,
                    detail: PayloadDetail::LateFlip {
                        early_money: early.money_percentage,
                        late_money: late.money_percentage,
                        swing,
                        window_minutes: self.config.flip_window_minutes,
                    },
                },
                created_at: Utc::now(),
                detector_version: self.version().to_string(),
            });
        }

        Ok(signals)
    }

    fn analyze_game(
        &self,
        game: &GameRecord,
        minutes_to_game: i64,
        splits: &[BettingSplit],
        tally: &mut RunTally,
    ) -> Result<Vec<Signal>, CandidateError> {
        validate_game(game)?;

        let timing = TimingCategory::classify(minutes_to_game);
        let mut signals = Vec::new();
        for bet_type in MARKETS {
            match self.analyze_market(game, bet_type, minutes_to_game, timing, splits) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip_market(NAME, &game.game_id, bet_type, &e),
            }
        }

        Ok(signals)
    }
}

#[async_trait::async_trait]
impl Detector for LateFlipDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::LateFlip
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Timing
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::BettingSplits]
    }

    fn description(&self) -> &'static str {
        "Money-leading side flipping inside the final window"
    }

    fn max_signals(&self) -> usize {
        self.config.max_signals
    }

    fn priority(&self, signal: &Signal) -> f64 {
        let mut priority = signal.confidence.score;
        if signal.timing == TimingCategory::UltraLate {
            priority += self.config.ultra_late_priority_bonus;
        }
        priority
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

        let mut tally = RunTally::default();
        let mut signals = Vec::new();
        for (game, minutes) in eligible {
            tally.saw_candidate();
            match self.analyze_game(game, minutes, &splits, &mut tally) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip(NAME, &game.game_id, &e),
            }
        }

        Ok(DetectorOutput::new(signals, tally))
    }
}
