// Consensus Detector
// Flags markets where tickets and money pile onto the same side across books

use chrono::Utc;
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

const NAME: &str = "consensus";
const MARKETS: [BetType; 3] = [BetType::Moneyline, BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Both money% and bet% must reach this on one side to count as agreement
    pub min_agreement: f64,
    /// Consensus strength at or above this is flagged extreme
    pub extreme_threshold: f64,
    /// Books agreeing before the multi-book bonus applies
    pub multi_book_count: usize,
    pub min_volume: u32,
    /// Magnitude thresholds (consensus strength above the 50% line)
    pub min_strength: f64,
    pub high_strength: f64,
    pub extreme_bonus: f64,
    pub multi_book_bonus: f64,
    /// Additive ranking bonus for extreme consensus
    pub extreme_priority_bonus: f64,
    pub max_signals: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_agreement: 65.0,
            extreme_threshold: 80.0,
            multi_book_count: 3,
            min_volume: 100,
            min_strength: 15.0,
            high_strength: 30.0,
            extreme_bonus: 1.10,
            multi_book_bonus: 1.08,
            extreme_priority_bonus: 0.05,
            max_signals: 10,
        }
    }
}

/// Detects ticket/money agreement strong enough to ride
pub struct ConsensusDetector {
    config: ConsensusConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl ConsensusDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(ConsensusConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: ConsensusConfig,
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self {
            config,
            repository,
            composer,
        }
    }

    /// Consensus strength of one split toward the given side, in 50..=100,
    /// or None when the split does not agree on that side
    fn agreement(&self, split: &BettingSplit, side: Side, bet_type: BetType) -> Option<f64> {
        let (money, bets) = if side == support::home_side(bet_type) {
            (split.money_percentage, split.bet_percentage)
        } else {
            (
                100.0 - split.money_percentage,
                100.0 - split.bet_percentage,
            )
        };
        if money >= self.config.min_agreement && bets >= self.config.min_agreement {
            Some((money + bets) / 2.0)
        } else {
            None
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
        let mut signals = Vec::new();

        let latest = support::latest_splits(splits, &game.game_id, bet_type);
        for split in &latest {
            validate_split(split)?;
        }

        let home = support::home_side(bet_type);
        for side in [home, home.opposite()] {
            let agreeing: Vec<(&&BettingSplit, f64)> = latest
                .iter()
                .filter(|s| s.volume >= self.config.min_volume)
                .filter_map(|s| self.agreement(s, side, bet_type).map(|a| (s, a)))
                .collect();
            let Some((best_split, best_strength)) = agreeing
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(s, a)| (**s, *a))
            else {
                continue;
            };

            let magnitude = best_strength - 50.0;
            if magnitude < self.config.min_strength {
                continue;
            }

            let extreme = best_strength >= self.config.extreme_threshold;
            let total_volume: u64 = agreeing.iter().map(|(s, _)| s.volume as u64).sum();

            let mut composition = self
                .composer
                .begin(
                    magnitude,
                    self.config.min_strength,
                    self.config.high_strength,
                )
                .book(&best_split.book)
                .volume(total_volume.min(u32::MAX as u64) as u32)
                .timing(timing);
            if extreme {
                composition = composition.bonus("extreme_consensus", self.config.extreme_bonus);
            }
            if agreeing.len() >= self.config.multi_book_count {
                composition =
                    composition.bonus("multi_book_consensus", self.config.multi_book_bonus);
            }
            let confidence = composition.finish();

            signals.push(Signal {
                id: Uuid::new_v4(),
                signal_type: SignalType::Consensus,
                category: StrategyCategory::PublicBias,
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
                source: DataSource::BettingSplits,
                books: agreeing.iter().map(|(s, _)| s.book.clone()).collect(),
                payload: SignalPayload {
                    magnitude,
                    detail: PayloadDetail::Consensus {
                        money_percentage: best_split.money_percentage,
                        bet_percentage: best_split.bet_percentage,
                        agreeing_books: agreeing.len(),
                        extreme,
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
impl Detector for ConsensusDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::Consensus
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::PublicBias
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::BettingSplits]
    }

    fn description(&self) -> &'static str {
        "Tickets and money agreeing on one side across books"
    }

    fn max_signals(&self) -> usize {
        self.config.max_signals
    }

    fn priority(&self, signal: &Signal) -> f64 {
        let mut priority = signal.confidence.score;
        if let PayloadDetail::Consensus { extreme: true, .. } = signal.payload.detail {
            priority += self.config.extreme_priority_bonus;
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
