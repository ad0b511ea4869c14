// Signal Generation Engine
// Turns market snapshots into scored, ranked betting signals

pub mod confidence;
pub mod context;
pub mod detector;
pub mod detectors;
pub mod error;
pub mod ranking;
pub mod runner;
pub mod signals;
pub mod timing;
pub mod validate;

pub use confidence::{base_confidence, BookWeights, Composition, ConfidenceComposer, VolumeWeights};
pub use context::ProcessingContext;
pub use detector::{DedupKey, Detector, DetectorOutput, RunTally};
pub use detectors::{
    BookConflictDetector, ConsensusDetector, HybridSharpDetector, LateFlipDetector,
    LineMovementDetector, PublicFadeDetector, SharpActionDetector, TimingPatternDetector,
    UnderdogValueDetector,
};
pub use error::{CandidateError, RunFailure};
pub use ranking::rank_signals;
pub use runner::{DetectorRunner, ProcessorInfo, RunReport, RunStatus};
pub use signals::{
    ConfidenceLevel, ConfidenceModifier, ConfidenceScore, ConflictType, PayloadDetail, Signal,
    SignalPayload, SignalType, StrategyCategory,
};
pub use timing::{TimingCategory, TimingWeights};
