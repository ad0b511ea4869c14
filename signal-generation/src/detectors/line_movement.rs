// Line Movement Detector
// Flags markets whose price has travelled meaningfully from the opener,
// with extra weight for reverse line movement and steam moves

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
use crate::validate::{validate_game, validate_snapshot};

const NAME: &str = "line_movement";
const MARKETS: [BetType; 2] = [BetType::Spread, BetType::Total];

#[derive(Debug, Clone)]
pub struct LineMovementConfig {
    /// Absolute open-to-current delta below this is noise
    pub min_move: f64,
    pub high_move: f64,
    /// Public ticket share that must oppose the move for it to count as RLM
    pub rlm_public_threshold: f64,
    /// Books moving together inside this window make a steam move
    pub steam_window_minutes: i64,
    pub steam_min_books: usize,
    pub rlm_bonus: f64,
    pub steam_bonus: f64,
    pub max_signals: usize,
}

impl Default for LineMovementConfig {
    fn default() -> Self {
        Self {
            min_move: 1.0,
            high_move: 3.0,
            rlm_public_threshold: 55.0,
            steam_window_minutes: 30,
            steam_min_books: 3,
            rlm_bonus: 1.10,
            steam_bonus: 1.12,
            max_signals: 10,
        }
    }
}

/// Detects significant open-to-current line travel
pub struct LineMovementDetector {
    config: LineMovementConfig,
    repository: Arc<dyn MarketDataRepository>,
    composer: Arc<ConfidenceComposer>,
}

impl LineMovementDetector {
    pub fn new(
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self::with_config(LineMovementConfig::default(), repository, composer)
    }

    pub fn with_config(
        config: LineMovementConfig,
        repository: Arc<dyn MarketDataRepository>,
        composer: Arc<ConfidenceComposer>,
    ) -> Self {
        Self {
            config,
            repository,
            composer,
        }
    }

    /// True when enough books moved the same direction near-simultaneously
    fn is_steam(
        &self,
        paths: &std::collections::HashMap<&str, (&LineSnapshot, &LineSnapshot)>,
        direction: f64,
    ) -> bool {
        let movers: Vec<&(&LineSnapshot, &LineSnapshot)> = paths
            .values()
            .filter(|(open, current)| {
                let delta = current.line - open.line;
                delta.abs() >= self.config.min_move && delta.signum() == direction
            })
            .collect();
        if movers.is_empty() || movers.len() < self.config.steam_min_books {
            return false;
        }
        let mut finals: Vec<_> = movers.iter().map(|(_, c)| c.recorded_at).collect();
        finals.sort();
        let spread = *finals.last().unwrap() - finals[0];
        spread.num_minutes() <= self.config.steam_window_minutes
    }

    fn analyze_market(
        &self,
        game: &GameRecord,
        bet_type: BetType,
        minutes_to_game: i64,
        timing: TimingCategory,
        lines: &[LineSnapshot],
        splits: &[BettingSplit],
    ) -> Result<Vec<Signal>, CandidateError> {
        let paths = support::book_paths(lines, &game.game_id, bet_type);
        for (open, current) in paths.values() {
            validate_snapshot(open)?;
            validate_snapshot(current)?;
        }

        let Some((book, (open, current))) = paths
            .iter()
            .max_by(|a, b| {
                let da = (a.1 .1.line - a.1 .0.line).abs();
                let db = (b.1 .1.line - b.1 .0.line).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(book, path)| (*book, *path))
        else {
            return Ok(Vec::new());
        };

        let delta = current.line - open.line;
        let magnitude = delta.abs();
        if magnitude < self.config.min_move {
            return Ok(Vec::new());
        }

        let side = support::moved_toward(bet_type, delta);

        // Reverse line movement: the public majority sits on the side
        // the line moved away from
        let latest = support::latest_splits(splits, &game.game_id, bet_type);
        let reverse = support::weighted_bet_percentage(&latest)
            .map(|(avg_bets, _)| {
                let public_share = if avg_bets >= 50.0 { avg_bets } else { 100.0 - avg_bets };
                let public_side = common::Side::majority_for(bet_type, avg_bets);
                public_share >= self.config.rlm_public_threshold && public_side != side
            })
            .unwrap_or(false);

        let steam = self.is_steam(&paths, delta.signum());

        let mut composition = self
            .composer
            .begin(magnitude, self.config.min_move, self.config.high_move)
            .book(book)
            .timing(timing);
        if reverse {
            composition = composition.bonus("reverse_line_movement", self.config.rlm_bonus);
        }
        if steam {
            composition = composition.bonus("steam_move", self.config.steam_bonus);
        }
        let confidence = composition.finish();

        let mut books: Vec<String> = paths.keys().map(|b| b.to_string()).collect();
        books.sort();

        Ok(vec![Signal {
            id: Uuid::new_v4(),
            signal_type: SignalType::LineMovement,
            category: StrategyCategory::MarketStructure,
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
            books,
            payload: SignalPayload {
                magnitude,
                detail: PayloadDetail::LineMovement {
                    opening_line: open.line,
                    current_line: current.line,
                    delta,
                    book: book.to_string(),
                    reverse,
                    steam,
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
        splits: &[BettingSplit],
        tally: &mut RunTally,
    ) -> Result<Vec<Signal>, CandidateError> {
        validate_game(game)?;

        let timing = TimingCategory::classify(minutes_to_game);
        let mut signals = Vec::new();
        for bet_type in MARKETS {
            match self.analyze_market(game, bet_type, minutes_to_game, timing, lines, splits) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip_market(NAME, &game.game_id, bet_type, &e),
            }
        }

        Ok(signals)
    }
}

#[async_trait::async_trait]
impl Detector for LineMovementDetector {
    fn signal_type(&self) -> SignalType {
        SignalType::LineMovement
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::MarketStructure
    }

    fn required_data_sources(&self) -> &'static [DataSource] {
        &[DataSource::LineHistory, DataSource::BettingSplits]
    }

    fn description(&self) -> &'static str {
        "Open-to-current line travel, reverse line movement and steam moves"
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
        let lines = self
            .repository
            .line_history(&ids)
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
            match self.analyze_game(game, minutes, &lines, &splits, &mut tally) {
                Ok(found) => signals.extend(found),
                Err(e) => tally.skip(NAME, &game.game_id, &e),
            }
        }

        Ok(DetectorOutput::new(signals, tally))
    }
}
