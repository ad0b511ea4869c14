// Market Data Repository Contract
// Asynchronous read-only access to observation records; pooling, retry and
// backpressure are the implementation's concern, not the engine's

use crate::types::{BettingSplit, GameRecord, LineSnapshot, OddsSnapshot, TimeWindow};
use anyhow::Result;

/// Read surface every detector acquires its observations through.
///
/// All methods are plain reads; a failed call is reported to the caller as a
/// run-level error and never retried here.
#[async_trait::async_trait]
pub trait MarketDataRepository: Send + Sync {
    /// Games scheduled inside the acceptance window
    async fn upcoming_games(&self, window: &TimeWindow) -> Result<Vec<GameRecord>>;

    /// All betting-split observations for the given games
    async fn betting_splits(&self, game_ids: &[String]) -> Result<Vec<BettingSplit>>;

    /// Full line history (all snapshots, all books) for the given games
    async fn line_history(&self, game_ids: &[String]) -> Result<Vec<LineSnapshot>>;

    /// Moneyline price snapshots for the given games
    async fn moneyline_odds(&self, game_ids: &[String]) -> Result<Vec<OddsSnapshot>>;
}
