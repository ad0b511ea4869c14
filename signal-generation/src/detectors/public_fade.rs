// Public Fade Detector
// Flags markets where the ticket count is lopsided enough that the other
// side carries contrarian value

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

const NAME: &str = "public_fade";
const MARKETS: [BetType; 3] = [BetType::Moneyline, BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct PublicFadeConfig {
    /// Volume-weighted ticket share that makes a side "public"
    pub min_public: f64,
    /// Share at or above this earns the extreme bonus
    pub extreme_public: f64,
    /// Combined ticket volume across books before the sample is trusted
    pub min_total_volume: u32,
    /// Magnitude thresholds (public share above the 50% line)
    pub min_magnitude: f64,
    pub high_magnitude: f64,
    pub extreme_bonus: f64,
    pub max_signals: usize,
}

impl Default for PublicFadeConfig {
    fn default() -> Self {
        Self {
            min_public: 70.0,
            extreme_public: 85.0,
            min_total_volume: 200,
            min_magnitude: 20.0,
            high_magnitude: 35.0,
            extreme_bonus: 1.08,
            max_signals: 10,
        }
    }
}

/// Recommends the side opposite a lopsided public
pub struct PublicFadeDetector {
    config: PublicFadeConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl PublicFadeDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(PublicFadeConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: PublicFadeConfig,
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
        let latest = support::latest_splits(splits, &game.game_id, bet_type);
        for split in &latest {
            validate_split(split)?;
        }

        let Some((avg_bets, total_volume)) = support::weighted_bet_percentage(&latest) else {
            return Ok(Vec::new());
        };
        if total_volume < self.config.min_total_volume {
            return Ok(Vec::new());
        }

        let public_side = Side::majority_for(bet_type, avg_bets);
        let public_share = if avg_bets >= 50.0 { avg_bets } else { 100.0 - avg_bets };
        if public_share < self.config.min_public {
            return Ok(Vec::new());
        }

        let magnitude = public_share - 50.0;
        let fade_side = public_side.opposite();

        let mut composition = self
            .composer
            .begin(
                magnitude,
                self.config.min_magnitude,
                self.config.high_magnitude,
            )
            .volume(total_volume)
            .timing(timing);
        if public_share >= self.config.extreme_public {
            composition = composition.bonus("extreme_public", self.config.extreme_bonus);
        }
        let confidence = composition.finish();

        Ok(vec![Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::PublicFade,
            category: StrategyCategory::PublicBias,
            game_id: game.game_id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            game_time: game.game_time,
            side: fade_side,
            bet_type,
            confidence,
            raw_strength: magnitude,
            minutes_to_game,
            timing,
            source: DataSource::BettingSplits,
            books: latest.iter().map(|s| s.book.clone()).collect(),
            payload: SignalPayload {
                magnitude,
                detail: PayloadDetail::PublicFade {
                    public_percentage: public_share,
                    public_side,
                    fade_side,
                    books_sampled: latest.len(),
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
impl Detector for PublicFadeDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::PublicFade
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::PublicBias
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::BettingSplits]
    }

    fn description(&self) -> &'static str {
        "Fading a lopsided public ticket count"
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
    use common::{InMemoryRepository, Sport};

    fn game(minutes_out: i64) -> GameRecord {
        GameRecord {
            game_id: "g1".to_string(),
            sport: Sport::Mlb,
            home_team: "Yankees".to_string(),
            away_team: "Red Sox".to_string(),
            game_time: Utc::now() + Duration::minutes(minutes_out),
        }
    }

    fn split(book: &str, bets: f64, volume: u32) -> BettingSplit {
        BettingSplit {
            game_id: "g1".to_string(),
            book: book.to_string(),
            bet_type: BetType::Moneyline,
            money_percentage: bets,
            bet_percentage: bets,
            volume,
            recorded_at: Utc::now(),
        }
    }

    fn detector(repo: Arc<InMemoryRepository>) -> PublicFadeDetector {
        PublicFadeDetector::new(repo, Arc::new(ConfidenceComposer::default()))
    }

    #[tokio::test]
    async fn test_heavy_public_is_faded() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("DraftKings", 78.0, 500), split("FanDuel", 74.0, 300)])
            .await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(signal.side, Side::Away);
        match signal.payload.detail {
            PayloadDetail::PublicFade { public_side, .. } => assert_eq!(public_side, Side::Home),
            _ => panic!("wrong payload"),
        }
    }

    #[tokio::test]
    async fn test_balanced_market_not_faded() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("DraftKings", 56.0, 800)]).await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_thin_sample_not_trusted() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("DraftKings", 80.0, 60)]).await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_extreme_public_bonus() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("DraftKings", 88.0, 1500)]).await;

        let output = detector(repo)
            .process_signals(&[game(45)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        assert!(output.signals[0]
            .confidence
            .modifiers
            .iter()
            .any(|m| m.name == "extreme_public"));
    }

    #[tokio::test]
    async fn test_public_on_away_fades_to_home() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_splits(vec![split("Caesars", 22.0, 900)]).await;

        let output = detector(repo)
            .process_signals(&[game(300)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        assert_eq!(output.signals[0].side, Side::Home);
    }
}
