// Underdog Value Detector
// Flags underdogs whose share of the money runs ahead of the win probability
// implied by their moneyline price

use chrono::Utc;
use common::{
    BetType, BettingSplit, DataSource, GameRecord, MarketDataRepository, OddsSnapshot, Side,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_odds, validate_split};

const NAME: &str = "underdog_value";

#[derive(Debug, Clone)]
pub struct UnderdogValueConfig {
    /// Gap between money support and implied probability, in points
    pub min_gap: f64,
    pub high_gap: f64,
    /// Implied probability above this is no longer an underdog worth a look
    pub max_implied: f64,
    pub min_volume: u32,
    pub max_signals: usize,
}

impl Default for UnderdogValueConfig {
    fn default() -> Self {
        Self {
            min_gap: 5.0,
            high_gap: 15.0,
            max_implied: 45.0,
            min_volume: 100,
            max_signals: 8,
        }
    }
}

/// Detects money support exceeding an underdog's implied probability
pub struct UnderdogValueDetector {
    config: UnderdogValueConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl UnderdogValueDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(UnderdogValueConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: UnderdogValueConfig,
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self {
            config,
            repository,
            composer,
        }
    }

    /// Latest odds snapshot per book for one game
    fn latest_odds<'a>(odds: &'a [OddsSnapshot], game_id: &str) -> Vec<&'a OddsSnapshot> {
        let mut latest: std::collections::HashMap<&str, &OddsSnapshot> =
            std::collections::HashMap::new();
        for snap in odds.iter().filter(|o| o.game_id == game_id) {
            match latest.get(snap.book.as_str()) {
                Some(current) if current.recorded_at >= snap.recorded_at => {}
                _ => {
                    latest.insert(snap.book.as_str(), snap);
                }
            }
        }
        let mut out: Vec<&OddsSnapshot> = latest.into_values().collect();
        out.sort_by(|a, b| a.book.cmp(&b.book));
        out
    }

    fn analyze_market(
        &self,
        game: &GameRecord,
        minutes_to_game: i64,
        timing: TimingCategory,
        odds: &[OddsSnapshot],
        splits: &[BettingSplit],
    ) -> Result<Vec<Signal>, CandidateError> {
        let mut signals = Vec::new();

        for snap in Self::latest_odds(odds, &game.game_id) {
            validate_odds(snap)?;

            let home_implied = support::implied_probability(snap.home_moneyline);
            let away_implied = support::implied_probability(snap.away_moneyline);
            let (underdog, implied, price) = if home_implied <= away_implied {
                (Side::Home, home_implied, snap.home_moneyline)
            } else {
                (Side::Away, away_implied, snap.away_moneyline)
            };
            if implied > self.config.max_implied {
                continue;
            }

            // Money support for the dog at the same book
            let Some(split) = support::latest_splits(splits, &game.game_id, BetType::Moneyline)
                .into_iter()
                .find(|s| s.book == snap.book)
            else {
                continue;
            };
            validate_split(split)?;
            if split.volume < self.config.min_volume {
                continue;
            }

            let money_support = if underdog == Side::Home {
                split.money_percentage
            } else {
                100.0 - split.money_percentage
            };
            let value_gap = money_support - implied;
            if value_gap < self.config.min_gap {
                continue;
            }

            let confidence = self
                .composer
                .begin(value_gap, self.config.min_gap, self.config.high_gap)
                .book(&snap.book)
                .volume(split.volume)
                .timing(timing)
                .finish();

            signals.push(Signal {
                id: Uuid::new_v4(),
                signal_type: SignalType::UnderdogValue,
                category: StrategyCategory::SharpMoney,
                game_id: game.game_id.clone(),
                home_team: game.home_team.clone(),
                away_team: game.away_team.clone(),
                game_time: game.game_time,
                side: underdog,
                bet_type: BetType::Moneyline,
                confidence,
                raw_strength: value_gap,
                minutes_to_game,
                timing,
                source: DataSource::Odds,
                books: vec![snap.book.clone()],
                payload: SignalPayload {
                    magnitude: value_gap,
                    detail: PayloadDetail::UnderdogValue {
                        underdog,
                        moneyline: price,
                        implied_probability: implied,
                        money_support,
                        value_gap,
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
        odds: &[OddsSnapshot],
        splits: &[BettingSplit],
        tally: &mut RunTally,
    ) -> Result<Vec<Signal>, CandidateError> {
        validate_game(game)?;

        let timing = TimingCategory::classify(minutes_to_game);
        match self.analyze_market(game, minutes_to_game, timing, odds, splits) {
            Ok(found) => Ok(found),
            Err(e) => {
                tally.skip_market(NAME, &game.game_id, BetType::Moneyline, &e);
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait::async_trait]
impl Detector for UnderdogValueDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::UnderdogValue
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::SharpMoney
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::Odds, DataSource::BettingSplits]
    }

    fn description(&self) -> &'static str {
        "Money backing an underdog beyond its implied win probability"
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
        let odds = self
            .repository
            .moneyline_odds(&ids)
            .await
            .map_err(|e| RunFailure::new(NAME, e))?;
        let splits = self
            .repository
            .betting_splits(&ids)
            .await
            .map_err(|e| RunFailure::new(NAME, e))?;

        let mut tally = RunTally::default();
        let mut signals = Vec::new();
        for (game, minutes) in eligible {
            tally.saw_candidate();
            match self.analyze_game(game, minutes, &odds, &splits, &mut tally) {
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
            sport: Sport::Nfl,
            home_team: "Jets".to_string(),
            away_team: "Dolphins".to_string(),
            game_time: Utc::now() + Duration::minutes(minutes_out),
        }
    }

    fn odds(home: i32, away: i32) -> OddsSnapshot {
        OddsSnapshot {
            game_id: "g1".to_string(),
            book: "Pinnacle".to_string(),
            home_moneyline: home,
            away_moneyline: away,
            recorded_at: Utc::now(),
        }
    }

    fn split(money: f64, volume: u32) -> BettingSplit {
        BettingSplit {
            game_id: "g1".to_string(),
            book: "Pinnacle".to_string(),
            bet_type: BetType::Moneyline,
            money_percentage: money,
            bet_percentage: 50.0,
            volume,
            recorded_at: Utc::now(),
        }
    }

    fn detector(repo: Arc<InMemoryRepository>) -> UnderdogValueDetector {
        UnderdogValueDetector::new(repo, Arc::new(ConfidenceComposer::default()))
    }

    #[tokio::test]
    async fn test_supported_home_dog_detected() {
        let repo = Arc::new(InMemoryRepository::new());
        // +150 home dog implies 40%, but 52% of the money backs it
        repo.seed_odds(vec![odds(150, -170)]).await;
        repo.seed_splits(vec![split(52.0, 400)]).await;

        let output = detector(repo)
            .process_signals(&[game(90)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(signal.side, Side::Home);
        assert_eq!(signal.bet_type, BetType::Moneyline);
        assert!((signal.raw_strength - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unsupported_dog_ignored() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_odds(vec![odds(150, -170)]).await;
        repo.seed_splits(vec![split(42.0, 400)]).await;

        let output = detector(repo)
            .process_signals(&[game(90)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_near_even_game_has_no_dog() {
        let repo = Arc::new(InMemoryRepository::new());
        // -110 both ways implies ~52.4% each; neither side is a real dog
        repo.seed_odds(vec![odds(-110, -110)]).await;
        repo.seed_splits(vec![split(60.0, 400)]).await;

        let output = detector(repo)
            .process_signals(&[game(90)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_away_dog_uses_inverse_money_share() {
        let repo = Arc::new(InMemoryRepository::new());
        // +180 away dog implies ~35.7%; 55% of money on away means 45% home
        repo.seed_odds(vec![odds(-200, 180)]).await;
        repo.seed_splits(vec![split(45.0, 600)]).await;

        let output = detector(repo)
            .process_signals(&[game(90)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(signal.side, Side::Away);
        match signal.payload.detail {
            PayloadDetail::UnderdogValue { value_gap, .. } => {
                assert!((value_gap - (55.0 - 100.0 / 280.0 * 100.0)).abs() < 1e-9)
            }
            _ => panic!("wrong payload"),
        }
    }
}
