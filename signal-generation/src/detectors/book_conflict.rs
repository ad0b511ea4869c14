// Book Conflict Detector
// Flags markets where books disagree on the current number: disagreement,
// strong disagreement, or an outright arbitrage window

use chrono::Utc;
use common::{BetType, DataSource, GameRecord, LineSnapshot, MarketDataRepository};
use std::sync::Arc;
use uuid::Uuid;

use crate::confidence::ConfidenceComposer;
use crate::context::ProcessingContext;
use crate::detector::{DedupKey, Detector, DetectorOutput, RunTally};
use crate::detectors::support;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{
    ConflictType, PayloadDetail, Signal, SignalPayload, SignalType, StrategyCategory,
};
use crate::timing::TimingCategory;
use crate::validate::{validate_game, validate_snapshot};

const NAME: &str = "book_conflict";
const MARKETS: [BetType; 2] = [BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct BookConflictConfig {
    /// Cross-book divergence below this is ordinary shading
    pub min_divergence: f64,
    pub strong_divergence: f64,
    pub arbitrage_divergence: f64,
    /// Books required before divergence is meaningful
    pub min_books: usize,
    pub strong_confidence_bonus: f64,
    pub arbitrage_confidence_bonus: f64,
    /// Additive ranking bonuses per conflict type
    pub strong_priority_bonus: f64,
    pub arbitrage_priority_bonus: f64,
    pub max_signals: usize,
}

impl Default for BookConflictConfig {
    fn default() -> Self {
        Self {
            min_divergence: 1.5,
            strong_divergence: 3.0,
            arbitrage_divergence: 4.5,
            min_books: 2,
            strong_confidence_bonus: 1.05,
            arbitrage_confidence_bonus: 1.12,
            strong_priority_bonus: 0.05,
            arbitrage_priority_bonus: 0.15,
            max_signals: 8,
        }
    }
}

/// Detects cross-book price divergence on the same market
pub struct BookConflictDetector {
    config: BookConflictConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl BookConflictDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(BookConflictConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: BookConflictConfig,
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self {
            config,
            repository,
            composer,
        }
    }

    fn classify_conflict(&self, divergence: f64) -> ConflictType {
        if divergence >= self.config.arbitrage_divergence {
            ConflictType::Arbitrage
        } else if divergence >= self.config.strong_divergence {
            ConflictType::StrongDisagreement
        } else {
            ConflictType::Disagreement
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
        let paths = support::book_paths(lines, &game.game_id, bet_type);
        if paths.len() < self.config.min_books {
            return Ok(Vec::new());
        }

        let mut current: Vec<(&str, &LineSnapshot)> = Vec::new();
        for (book, (_, snap)) in &paths {
            validate_snapshot(snap)?;
            current.push((*book, *snap));
        }
        current.sort_by(|a, b| {
            a.1.line
                .partial_cmp(&b.1.line)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let (low_book, low) = current[0];
        let (high_book, high) = current[current.len() - 1];
        let divergence = high.line - low.line;
        if divergence < self.config.min_divergence {
            return Ok(Vec::new());
        }

        let conflict_type = self.classify_conflict(divergence);
        let side = support::home_side(bet_type);

        let mut composition = self
            .composer
            .begin(
                divergence,
                self.config.min_divergence,
                self.config.arbitrage_divergence,
            )
            .timing(timing);
        match conflict_type {
            ConflictType::Arbitrage => {
                composition =
                    composition.bonus("arbitrage", self.config.arbitrage_confidence_bonus);
            }
            ConflictType::StrongDisagreement => {
                composition = composition
                    .bonus("strong_disagreement", self.config.strong_confidence_bonus);
            }
            ConflictType::Disagreement => {}
        }
        let confidence = composition.finish();

        Ok(vec![Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::BookConflict,
            category: StrategyCategory::MarketStructure,
            game_id: game.game_id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            game_time: game.game_time,
            side,
            bet_type,
            confidence,
            raw_strength: divergence,
            minutes_to_game,
            timing,
            source: DataSource::LineHistory,
            books: vec![high_book.to_string(), low_book.to_string()],
            payload: SignalPayload {
                magnitude: divergence,
                detail: PayloadDetail::BookConflict {
                    conflict_type,
                    high_book: high_book.to_string(),
                    high_line: high.line,
                    low_book: low_book.to_string(),
                    low_line: low.line,
                    divergence,
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

    fn conflict_type_of(signal: &Signal) -> Option<ConflictType> {
        match signal.payload.detail {
            PayloadDetail::BookConflict { conflict_type, .. } => Some(conflict_type),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl Detector for BookConflictDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::BookConflict
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::MarketStructure
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::LineHistory]
    }

    fn description(&self) -> &'static str {
        "Books posting materially different numbers on the same market"
    }

    fn max_signals(&self) -> usize {
        self.config.max_signals
    }

    /// Conflicts of different kinds on the same market are distinct signals
    fn dedup_key(&self, signal: &Signal) -> DedupKey {
        match Self::conflict_type_of(signal) {
            Some(ct) => DedupKey::refined(
                signal.game_id.clone(),
                signal.bet_type,
                ct.as_str().to_string(),
            ),
            None => DedupKey::new(signal.game_id.clone(), signal.bet_type),
        }
    }

    fn priority(&self, signal: &Signal) -> f64 {
        let mut priority = signal.confidence.score;
        match Self::conflict_type_of(signal) {
            Some(ConflictType::Arbitrage) => priority += self.config.arbitrage_priority_bonus,
            Some(ConflictType::StrongDisagreement) => {
                priority += self.config.strong_priority_bonus
            }
            _ => {}
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{InMemoryRepository, Sport};

    fn game(minutes_out: i64) -> GameRecord {
        GameRecord {
            game_id: "g1".to_string(),
            sport: Sport::Ncaab,
            home_team: "Duke".to_string(),
            away_team: "UNC".to_string(),
            game_time: Utc::now() + Duration::minutes(minutes_out),
        }
    }

    fn snap(book: &str, line: f64) -> LineSnapshot {
        LineSnapshot {
            game_id: "g1".to_string(),
            book: book.to_string(),
            bet_type: BetType::Spread,
            line,
            recorded_at: Utc::now(),
        }
    }

    fn detector(repo: Arc<InMemoryRepository>) -> BookConflictDetector {
        BookConflictDetector::new(repo, Arc::new(ConfidenceComposer::default()))
    }

    #[tokio::test]
    async fn test_divergence_classified_and_emitted() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_lines(vec![snap("Pinnacle", -2.0), snap("BetMGM", -5.5)]).await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        match output.signals[0].payload.detail {
            PayloadDetail::BookConflict {
                conflict_type,
                divergence,
                ..
            } => {
                assert_eq!(conflict_type, ConflictType::StrongDisagreement);
                assert!((divergence - 3.5).abs() < 1e-9);
            }
            _ => panic!("wrong payload"),
        }
    }

    #[tokio::test]
    async fn test_arbitrage_priority_outranks_score() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_lines(vec![snap("Pinnacle", -1.0), snap("Caesars", -6.0)]).await;

        let det = detector(repo);
        let output = det
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(
            BookConflictDetector::conflict_type_of(signal),
            Some(ConflictType::Arbitrage)
        );
        assert!(det.priority(signal) >= signal.confidence.score + 0.15 - 1e-9);
    }

    #[tokio::test]
    async fn test_single_book_never_conflicts() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_lines(vec![snap("Pinnacle", -2.0)]).await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_shading_below_threshold_ignored() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_lines(vec![snap("Pinnacle", -2.0), snap("BetMGM", -3.0)]).await;

        let output = detector(repo)
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        assert!(output.signals.is_empty());
    }

    #[tokio::test]
    async fn test_refined_dedup_key_includes_conflict_type() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed_lines(vec![snap("Pinnacle", -1.0), snap("Caesars", -6.0)]).await;

        let det = detector(repo);
        let output = det
            .process_signals(&[game(120)], &ProcessingContext::default())
            .await
            .unwrap();
        let key = det.dedup_key(&output.signals[0]);
        assert_eq!(key.refinement.as_deref(), Some("arbitrage"));
    }
}
