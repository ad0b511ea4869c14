// Error Taxonomy
// Two tiers: a RunFailure aborts the whole detector run; a CandidateError is
// absorbed at candidate scope and the batch continues.

use thiserror::Error;

/// The data-acquisition step itself failed.
///
/// The only error that crosses the detector boundary, and even then it is
/// surfaced to callers as an empty signal list plus a Failed run report, not
/// a propagated error.
#[derive(Debug, Error)]
#[error("{detector}: data acquisition failed: {source}")]
pub struct RunFailure {
    pub detector: &'static str,
    #[source]
    pub source: anyhow::Error,
}

impl RunFailure {
    pub fn new(detector: &'static str, source: anyhow::Error) -> Self {
        Self { detector, source }
    }
}

/// A problem confined to one candidate (one game/market combination)
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Analysis could not complete for this candidate
    #[error("candidate skipped: {0}")]
    Skip(String),
    /// Raw fields failed shape/range checks before analysis began
    #[error("validation failed: {0}")]
    Validation(String),
}
