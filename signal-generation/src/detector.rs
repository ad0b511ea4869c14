// Detector Contract
// The single interface every pattern detector implements. Strategy-specific
// anomaly math lives behind it; everything else is shared machinery.

use common::{BetType, DataSource, GameRecord};
use tracing::warn;

use crate::context::ProcessingContext;
use crate::error::{CandidateError, RunFailure};
use crate::signals::{Signal, SignalType, StrategyCategory};

/// Grouping key for the dedup stage: minimally (game, market), optionally
/// refined by a pattern sub-type such as a conflict type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub game_id: String,
    pub bet_type: BetType,
    pub refinement: Option<String>,
}

impl DedupKey {
    pub fn new(game_id: String, bet_type: BetType) -> Self {
        Self {
            game_id,
            bet_type,
            refinement: None,
        }
    }

    pub fn refined(game_id: String, bet_type: BetType, refinement: String) -> Self {
        Self {
            game_id,
            bet_type,
            refinement: Some(refinement),
        }
    }
}

/// Per-invocation tally a detector fills in while it works.
///
/// Candidate-scope problems land here (and in the log) without aborting the
/// rest of the batch; the runner folds the tally into its run report.
#[derive(Debug, Clone, Default)]
pub struct RunTally {
    pub candidates_seen: usize,
    pub errors: Vec<String>,
}

impl RunTally {
    pub fn saw_candidate(&mut self) {
        self.candidates_seen += 1;
    }

    /// Record one skipped game; exactly one warning per skip
    pub fn skip(&mut self, detector: &str, game_id: &str, error: &CandidateError) {
        warn!(detector, game_id, %error, "candidate skipped");
        self.errors.push(format!("{game_id}: {error}"));
    }

    /// Record one skipped market within a game; the game's other markets
    /// keep whatever they already produced
    pub fn skip_market(
        &mut self,
        detector: &str,
        game_id: &str,
        bet_type: BetType,
        error: &CandidateError,
    ) {
        warn!(detector, game_id, market = bet_type.as_str(), %error, "market skipped");
        self.errors
            .push(format!("{game_id}/{}: {error}", bet_type.as_str()));
    }
}

/// What one detector invocation produced
#[derive(Debug, Default)]
pub struct DetectorOutput {
    pub signals: Vec<Signal>,
    pub tally: RunTally,
}

impl DetectorOutput {
    pub fn new(signals: Vec<Signal>, tally: RunTally) -> Self {
        Self { signals, tally }
    }
}

/// One family of market anomalies.
///
/// Implementations share the same four-stage shape: acquire observations,
/// compute an anomaly magnitude, gate it against the minimum threshold and
/// structural preconditions, then compose confidence and build a signal.
/// Only a failed acquisition may escape as `RunFailure`; every per-candidate
/// problem is absorbed through the tally. An empty output, never an error,
/// is the answer when nothing qualifies.
#[async_trait::async_trait]
pub trait Detector: Send + Sync {
    fn signal_type(&self) -> SignalType;

    fn category(&self) -> StrategyCategory;

    /// Logical sources this detector reads; documentation/validation only,
    /// never enforced against the repository
    fn required_data_sources(&self) -> &'static [DataSource];

    fn description(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1.0"
    }

    /// Cap applied by the rank stage
    fn max_signals(&self) -> usize {
        10
    }

    /// Dedup grouping key for one emitted signal
    fn dedup_key(&self, signal: &Signal) -> DedupKey {
        DedupKey::new(signal.game_id.clone(), signal.bet_type)
    }

    /// Ranking priority; detectors add bonuses for qualitatively stronger
    /// cases on top of the confidence score
    fn priority(&self, signal: &Signal) -> f64 {
        signal.confidence.score
    }

    /// Single entry point for one run over a batch of games
    async fn process_signals(
        &self,
        games: &[GameRecord],
        ctx: &ProcessingContext,
    ) -> Result<DetectorOutput, RunFailure>;
}
