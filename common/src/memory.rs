// In-Memory Repository
// Backing store for tests and local development; not a persistence layer

use crate::repository::MarketDataRepository;
use crate::types::{BettingSplit, GameRecord, LineSnapshot, OddsSnapshot, TimeWindow};
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory implementation of [`MarketDataRepository`].
///
/// Seeded up-front, read concurrently. `fail_next` flips the next read into
/// an error so callers can exercise run-failure paths.
pub struct InMemoryRepository {
    games: RwLock<Vec<GameRecord>>,
    splits: RwLock<Vec<BettingSplit>>,
    lines: RwLock<Vec<LineSnapshot>>,
    odds: RwLock<Vec<OddsSnapshot>>,
    fail_next: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(Vec::new()),
            splits: RwLock::new(Vec::new()),
            lines: RwLock::new(Vec::new()),
            odds: RwLock::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    pub async fn seed_games(&self, games: Vec<GameRecord>) {
        self.games.write().await.extend(games);
    }

    pub async fn seed_splits(&self, splits: Vec<BettingSplit>) {
        self.splits.write().await.extend(splits);
    }

    pub async fn seed_lines(&self, lines: Vec<LineSnapshot>) {
        self.lines.write().await.extend(lines);
    }

    pub async fn seed_odds(&self, odds: Vec<OddsSnapshot>) {
        self.odds.write().await.extend(odds);
    }

    /// Force the next repository read to fail
    pub fn fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(anyhow!("repository unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MarketDataRepository for InMemoryRepository {
    async fn upcoming_games(&self, window: &TimeWindow) -> Result<Vec<GameRecord>> {
        self.check_failure()?;
        let games = self.games.read().await;
        Ok(games
            .iter()
            .filter(|g| window.contains(g.game_time))
            .cloned()
            .collect())
    }

    async fn betting_splits(&self, game_ids: &[String]) -> Result<Vec<BettingSplit>> {
        self.check_failure()?;
        let splits = self.splits.read().await;
        Ok(splits
            .iter()
            .filter(|s| game_ids.contains(&s.game_id))
            .cloned()
            .collect())
    }

    async fn line_history(&self, game_ids: &[String]) -> Result<Vec<LineSnapshot>> {
        self.check_failure()?;
        let lines = self.lines.read().await;
        Ok(lines
            .iter()
            .filter(|l| game_ids.contains(&l.game_id))
            .cloned()
            .collect())
    }

    async fn moneyline_odds(&self, game_ids: &[String]) -> Result<Vec<OddsSnapshot>> {
        self.check_failure()?;
        let odds = self.odds.read().await;
        Ok(odds
            .iter()
            .filter(|o| game_ids.contains(&o.game_id))
            .cloned()
            .collect())
    }
}
