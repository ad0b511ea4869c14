// Sharp Action Detector
// Flags markets where the share of money runs well ahead of the share of
// tickets: a few large bets against many small ones

use chrono::Utc;
use common::{BetType, BettingSplit, DataSource, GameRecord, MarketDataRepository};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_split};

const NAME: &str = "sharp_action";
const MARKETS: [BetType; 3] = [BetType::Moneyline, BetType::Spread, BetType::Total];

/// Thresholds for the money/ticket differential, fixed at detector creation
#[derive(Debug, Clone)]
pub struct SharpActionConfig {
    /// Differential below this never produces a signal
    pub min_differential: f64,
    /// Differential at or above this caps the base confidence
    pub high_differential: f64,
    /// Minimum ticket volume for a split to count
    pub min_volume: u32,
    pub max_signals: usize,
}

impl Default for SharpActionConfig {
    fn default() -> Self {
        Self {
            min_differential: 8.0,
            high_differential: 20.0,
            min_volume: 100,
            max_signals: 10,
        }
    }
}

/// Detects sharp-money divergence from betting splits
pub struct SharpActionDetector {
    config: SharpActionConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl SharpActionDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(SharpActionConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: SharpActionConfig,
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
        let mut signals = Vec::new();

        for split in support::latest_splits(splits, &game.game_id, bet_type) {
            validate_split(split)?;

            let differential = split.money_percentage - split.bet_percentage;
            let magnitude = differential.abs();
            if magnitude < self.config.min_differential {
                continue;
            }
            if split.volume < self.config.min_volume {
                debug!(
                    game_id = %game.game_id,
                    book = %split.book,
                    volume = split.volume,
                    "sharp differential on thin volume, dropped"
                );
                continue;
            }

            let side = if differential >= 0.0 {
                support::home_side(bet_type)
            } else {
                support::home_side(bet_type).opposite()
            };

            let confidence = self
                .composer
                .begin(
                    magnitude,
                    self.config.min_differential,
                    self.config.high_differential,
                )
                .book(&split.book)
                .volume(split.volume)
                .timing(timing)
                .finish();

            signals.push(Signal {
                id: Uuid::new_v4(),
                signal_type: SignalType::SharpAction,
                category: StrategyCategory::SharpMoney,
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
                books: vec![split.book.clone()],
                payload: SignalPayload {
                    magnitude,
                    detail: PayloadDetail::SharpAction {
                        money_percentage: split.money_percentage,
                        bet_percentage: split.bet_percentage,
                        differential,
                        book: split.book.clone(),
                    },
                },
                created_at: Utc::now(),
                detector_version: self.version().to_string(),
            });
        }

        Ok(signals)
    }

    /// A market-scope failure drops that market alone; the game's other
    /// markets keep their signals
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
impl Detector for SharpActionDetector {
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
        "Money percentage running ahead of ticket percentage at a single book"
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{BettingSplit, InMemoryRepository, Side, Sport};

    fn game(id: &str, minutes_out: i64) -> GameRecord {
        GameRecord {
            game_id: id.to_string(),
            sport: Sport::Nfl,
            home_team: "Chiefs".to_string(),
            away_team: "Bills".to_string(),
            game_time: Utc::now() + Duration::minutes(minutes_out),
        }
    }

    fn split(game_id: &str, book: &str, money: f64, bets: f64, volume: u32) -> BettingSplit {
        BettingSplit {
            game_id: game_id.to_string(),
            book: book.to_string(),
            bet_type: BetType::Spread,
            money_percentage: money,
            bet_percentage: bets,
            volume,
            recorded_at: Utc::now(),
        }
    }

    fn detector(repo: Arc<InMemoryRepository>) -> SharpActionDetector {
        SharpActionDetector::new(repo, Arc::new(ConfidenceComposer::default()))
    }

    #[tokio::test]
    async fn test_strong_differential_emits_home_signal() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("g1", "Pinnacle", 68.0, 42.0, 750)])
            .await;

        let games = vec![game("g1", 25)];
        let ctx = ProcessingContext::new(Utc::now(), 1440, 0.6);
        let output = detector(repo).process_signals(&games, &ctx).await.unwrap();

        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(signal.side, Side::Home);
        assert_eq!(signal.timing, TimingCategory::UltraLate);
        assert!((signal.raw_strength - 26.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_below_min_differential_emits_nothing() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("g1", "Pinnacle", 54.0, 48.0, 750)])
            .await;

        let games = vec![game("g1", 120)];
        let ctx = ProcessingContext::default();
        let output = detector(repo).process_signals(&games, &ctx).await.unwrap();
        assert!(output.signals.is_empty());
        assert_eq!(output.tally.candidates_seen, 1);
    }

    #[tokio::test]
    async fn test_thin_volume_is_gated() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("g1", "Pinnacle", 70.0, 40.0, 40)])
            .await;

        let games = vec![game("g1", 120)];
        let output = detector(repo)
            .process_signals(&games, &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_negative_differential_recommends_away() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("g1", "Circa", 30.0, 58.0, 900)])
            .await;

        let games = vec![game("g1", 200)];
        let output = detector(repo)
            .process_signals(&games, &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        assert_eq!(output.signals[0].side, Side::Away);
    }

    #[tokio::test]
    async fn test_malformed_split_skips_candidate_only() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![
            split("g1", "Pinnacle", 68.0, 42.0, 750),
            split("g2", "Pinnacle", 150.0, 42.0, 750),
        ])
        .await;

        let games = vec![game("g1", 60), game("g2", 60)];
        let output = detector(repo)
            .process_signals(&games, &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        assert_eq!(output.tally.errors.len(), 1);
        assert!(output.tally.errors[0].contains("g2"));
    }

    #[tokio::test]
    async fn test_bad_market_leaves_sibling_markets_standing() {
        let repo = Arc::new(InMemoryRepository::new());
        // Valid moneyline split next to a malformed spread split, same game
        repo.seed_splits(vec![
            BettingSplit {
                game_id: "g1".to_string(),
                book: "Pinnacle".to_string(),
                bet_type: BetType::Moneyline,
                money_percentage: 68.0,
                bet_percentage: 42.0,
                volume: 750,
                recorded_at: Utc::now(),
            },
            split("g1", "Pinnacle", 150.0, 42.0, 750),
        ])
        .await;

        let games = vec![game("g1", 60)];
        let output = detector(repo)
            .process_signals(&games, &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        assert_eq!(output.signals[0].bet_type, BetType::Moneyline);
        assert_eq!(output.tally.errors.len(), 1);
        assert!(output.tally.errors[0].contains("g1/spread"));
    }

    #[tokio::test]
    async fn test_repository_failure_is_run_failure() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.fail_next(true);
        let games = vec![game("g1", 60)];
        let result = detector(repo)
            .process_signals(&games, &ProcessingContext::default())
            .await;
        assert!(result.is_err());
    }
}
