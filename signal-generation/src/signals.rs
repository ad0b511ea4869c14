// Signal Data Model
// The canonical output unit every detector emits, plus its scoring metadata

use chrono::{DateTime, Utc};
use common::{BetType, DataSource, Side};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timing::TimingCategory;

/// Signal type, one variant per detector family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    SharpAction,
    Consensus,
    LineMovement,
    TimingPattern,
    BookConflict,
    PublicFade,
    LateFlip,
    UnderdogValue,
    HybridSharp,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::SharpAction => "sharp_action",
            SignalType::Consensus => "consensus",
            SignalType::LineMovement => "line_movement",
            SignalType::TimingPattern => "timing_pattern",
            SignalType::BookConflict => "book_conflict",
            SignalType::PublicFade => "public_fade",
            SignalType::LateFlip => "late_flip",
            SignalType::UnderdogValue => "underdog_value",
            SignalType::HybridSharp => "hybrid_sharp",
        }
    }
}

/// Broad strategy family a detector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyCategory {
    SharpMoney,
    PublicBias,
    MarketStructure,
    Timing,
    Hybrid,
}

impl StrategyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyCategory::SharpMoney => "sharp_money",
            StrategyCategory::PublicBias => "public_bias",
            StrategyCategory::MarketStructure => "market_structure",
            StrategyCategory::Timing => "timing",
            StrategyCategory::Hybrid => "hybrid",
        }
    }
}

/// Discrete confidence bucket derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Fixed breakpoints: >= 0.8 High, >= 0.6 Medium, else Low
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.6 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// One named multiplier applied during confidence composition.
/// Purely descriptive; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceModifier {
    pub name: String,
    pub multiplier: f64,
}

/// Final confidence with its audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// Always in [0, 1]
    pub score: f64,
    pub level: ConfidenceLevel,
    pub modifiers: Vec<ConfidenceModifier>,
}

/// How strongly two books disagree on the same market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictType {
    Disagreement,
    StrongDisagreement,
    Arbitrage,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Disagreement => "disagreement",
            ConflictType::StrongDisagreement => "strong_disagreement",
            ConflictType::Arbitrage => "arbitrage",
        }
    }
}

/// Detector-specific structured payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PayloadDetail {
    SharpAction {
        money_percentage: f64,
        bet_percentage: f64,
        differential: f64,
        book: String,
    },
    Consensus {
        money_percentage: f64,
        bet_percentage: f64,
        agreeing_books: usize,
        extreme: bool,
    },
    LineMovement {
        opening_line: f64,
        current_line: f64,
        delta: f64,
        book: String,
        reverse: bool,
        steam: bool,
    },
    TimingPattern {
        total_movement: f64,
        late_movement: f64,
        late_share: f64,
        window_minutes: i64,
    },
    BookConflict {
        conflict_type: ConflictType,
        high_book: String,
        high_line: f64,
        low_book: String,
        low_line: f64,
        divergence: f64,
    },
    PublicFade {
        public_percentage: f64,
        public_side: Side,
        fade_side: Side,
        books_sampled: usize,
    },
    LateFlip {
        early_money: f64,
        late_money: f64,
        swing: f64,
        window_minutes: i64,
    },
    UnderdogValue {
        underdog: Side,
        moneyline: i32,
        implied_probability: f64,
        money_support: f64,
        value_gap: f64,
    },
    HybridSharp {
        differential: f64,
        line_delta: f64,
        combined: f64,
    },
    /// Last-resort extensibility escape hatch
    Custom(serde_json::Value),
}

/// Common payload envelope carried by every signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    /// The detector's anomaly magnitude for this candidate
    pub magnitude: f64,
    pub detail: PayloadDetail,
}

/// A single emitted betting recommendation.
///
/// Created once per qualifying anomaly inside a detector run and immutable
/// afterwards; the engine holds no reference after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub signal_type: SignalType,
    pub category: StrategyCategory,

    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub game_time: DateTime<Utc>,

    pub side: Side,
    pub bet_type: BetType,

    pub confidence: ConfidenceScore,
    pub raw_strength: f64,

    pub minutes_to_game: i64,
    pub timing: TimingCategory,

    pub source: DataSource,
    pub books: Vec<String>,

    pub payload: SignalPayload,

    pub created_at: DateTime<Utc>,
    pub detector_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_breakpoints() {
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.6), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.59), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_signal_type_names_are_stable() {
        assert_eq!(SignalType::SharpAction.as_str(), "sharp_action");
        assert_eq!(SignalType::HybridSharp.as_str(), "hybrid_sharp");
    }
}
