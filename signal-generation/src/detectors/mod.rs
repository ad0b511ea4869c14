// Detector Implementations
// One module per strategy, plus shared market-data helpers

pub mod support;

pub mod book_conflict;
pub mod consensus;
pub mod hybrid_sharp;
pub mod late_flip;
pub mod line_movement;
pub mod public_fade;
pub mod sharp_action;
pub mod timing_pattern;
pub mod underdog_value;

pub use book_conflict::{BookConflictConfig, BookConflictDetector};
pub use consensus::{ConsensusConfig, ConsensusDetector};
pub use hybrid_sharp::{HybridSharpConfig, HybridSharpDetector};
pub use late_flip::{LateFlipConfig, LateFlipDetector};
pub use line_movement::{LineMovementConfig, LineMovementDetector};
pub use public_fade::{PublicFadeConfig, PublicFadeDetector};
pub use sharp_action::{SharpActionConfig, SharpActionDetector};
pub use timing_pattern::{TimingPatternConfig, TimingPatternDetector};
pub use underdog_value::{UnderdogValueConfig, UnderdogValueDetector};
