// Execution Wrapper
// Lifecycle state machine and error isolation around one detector. A failed
// run surfaces as an empty list plus a Failed report, never a propagated
// error, so a caller's fan-out stays resilient.

use chrono::{DateTime, Utc};
use common::{DataSource, GameRecord, MarketDataRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::context::ProcessingContext;
use crate::detector::Detector;
use crate::ranking::rank_signals;
use crate::signals::{Signal, SignalType, StrategyCategory};

/// Run lifecycle. Pending -> Processing -> {Completed, Failed}; no other
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Introspection record for the most recent run.
///
/// The only way for a caller to distinguish "no anomalies found" from
/// "this detector is broken".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub signals_generated: usize,
    pub candidates_seen: usize,
    pub errors: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            status: RunStatus::Pending,
            signals_generated: 0,
            candidates_seen: 0,
            errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Static description of a wrapped detector plus its last run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorInfo {
    pub name: String,
    pub signal_type: SignalType,
    pub category: StrategyCategory,
    pub required_data_sources: Vec<DataSource>,
    pub description: String,
    pub version: String,
    pub last_run: RunReport,
}

/// Wraps one detector with lifecycle tracking, the final confidence gate and
/// the filter/dedup/rank stage.
pub struct DetectorRunner {
    detector: Arc<dyn Detector>,
    repository: Arc<dyn MarketDataRepository>,
    last_report: RwLock<RunReport>,
}

impl DetectorRunner {
    pub fn new(detector: Arc<dyn Detector>, repository: Arc<dyn MarketDataRepository>) -> Self {
        info!(
            detector = detector.signal_type().as_str(),
            "registering detector runner"
        );
        Self {
            detector,
            repository,
            last_report: RwLock::new(RunReport::default()),
        }
    }

    /// Run the detector over an already-acquired batch of games.
    ///
    /// Returns the filtered, deduplicated, ranked signal list; empty on
    /// failure or when nothing qualifies.
    pub async fn run(&self, games: &[GameRecord], ctx: &ProcessingContext) -> Vec<Signal> {
        let started_at = Utc::now();
        {
            let mut report = self.last_report.write().await;
            *report = RunReport {
                status: RunStatus::Processing,
                started_at: Some(started_at),
                ..RunReport::default()
            };
        }

        match self.detector.process_signals(games, ctx).await {
            Ok(output) => {
                let gated: Vec<Signal> = output
                    .signals
                    .into_iter()
                    .filter(|s| {
                        let keep = s.confidence.score >= ctx.min_confidence_threshold;
                        if !keep {
                            debug!(
                                detector = self.detector.signal_type().as_str(),
                                game_id = %s.game_id,
                                score = s.confidence.score,
                                "signal below confidence floor"
                            );
                        }
                        keep
                    })
                    .collect();
                let ranked = rank_signals(gated, self.detector.as_ref());

                let mut report = self.last_report.write().await;
                *report = RunReport {
                    status: RunStatus::Completed,
                    signals_generated: ranked.len(),
                    candidates_seen: output.tally.candidates_seen,
                    errors: output.tally.errors,
                    started_at: Some(started_at),
                    finished_at: Some(Utc::now()),
                };
                info!(
                    detector = self.detector.signal_type().as_str(),
                    signals = ranked.len(),
                    candidates = report.candidates_seen,
                    "run completed"
                );
                ranked
            }
            Err(failure) => {
                error!(
                    detector = self.detector.signal_type().as_str(),
                    error = %failure,
                    "run failed"
                );
                let mut report = self.last_report.write().await;
                *report = RunReport {
                    status: RunStatus::Failed,
                    errors: vec![failure.to_string()],
                    started_at: Some(started_at),
                    finished_at: Some(Utc::now()),
                    ..RunReport::default()
                };
                Vec::new()
            }
        }
    }

    /// Legacy call shape: build a context at the current instant, fetch the
    /// game batch and delegate. A non-empty strategy filter that does not
    /// name this detector's type or category skips the run entirely.
    pub async fn process(
        &self,
        minutes_ahead: i64,
        profitable_strategies: &[String],
    ) -> Vec<Signal> {
        if !profitable_strategies.is_empty() && !self.matches_filter(profitable_strategies) {
            debug!(
                detector = self.detector.signal_type().as_str(),
                "detector excluded by strategy filter"
            );
            return Vec::new();
        }

        let ctx = ProcessingContext::new(Utc::now(), minutes_ahead, 0.6);
        let games = match self.repository.upcoming_games(&ctx.window()).await {
            Ok(games) => games,
            Err(e) => {
                error!(
                    detector = self.detector.signal_type().as_str(),
                    error = %e,
                    "failed to fetch upcoming games"
                );
                let mut report = self.last_report.write().await;
                *report = RunReport {
                    status: RunStatus::Failed,
                    errors: vec![format!("upcoming games fetch failed: {e}")],
                    started_at: Some(ctx.processing_time),
                    finished_at: Some(Utc::now()),
                    ..RunReport::default()
                };
                return Vec::new();
            }
        };

        self.run(&games, &ctx).await
    }

    fn matches_filter(&self, strategies: &[String]) -> bool {
        let type_name = self.detector.signal_type().as_str();
        let category_name = self.detector.category().as_str();
        strategies.iter().any(|s| {
            s.eq_ignore_ascii_case(type_name) || s.eq_ignore_ascii_case(category_name)
        })
    }

    /// Static detector description plus the last run report
    pub async fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: self.detector.signal_type().as_str().to_string(),
            signal_type: self.detector.signal_type(),
            category: self.detector.category(),
            required_data_sources: self.detector.required_data_sources().to_vec(),
            description: self.detector.description().to_string(),
            version: self.detector.version().to_string(),
            last_run: self.last_report.read().await.clone(),
        }
    }
}
