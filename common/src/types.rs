// Shared Domain Types
// Raw observation records as delivered by the data layer, before any analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sport a game belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    Nfl,
    Nba,
    Mlb,
    Nhl,
    Ncaaf,
    Ncaab,
    Soccer,
}

/// Market a recommendation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetType {
    Moneyline,
    Spread,
    Total,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Moneyline => "moneyline",
            BetType::Spread => "spread",
            BetType::Total => "total",
        }
    }
}

/// Side of a market a bet is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
}

impl Side {
    /// The opposing side of the same market
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
            Side::Over => Side::Under,
            Side::Under => Side::Over,
        }
    }

    /// Side holding the majority when a home/over share is above 50%
    pub fn majority_for(bet_type: BetType, home_share: f64) -> Side {
        match bet_type {
            BetType::Total => {
                if home_share >= 50.0 {
                    Side::Over
                } else {
                    Side::Under
                }
            }
            _ => {
                if home_share >= 50.0 {
                    Side::Home
                } else {
                    Side::Away
                }
            }
        }
    }
}

/// A scheduled game as known to the data layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub game_time: DateTime<Utc>,
}

/// One betting-split observation for a game/book/market combination.
///
/// `money_percentage` and `bet_percentage` are the share of handle and of
/// tickets on the home side (over side for totals), in 0..=100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingSplit {
    pub game_id: String,
    pub book: String,
    pub bet_type: BetType,
    pub money_percentage: f64,
    pub bet_percentage: f64,
    pub volume: u32,
    pub recorded_at: DateTime<Utc>,
}

/// One posted line observation for a game/book/market combination.
///
/// For spreads the line is the home handicap; for totals it is the posted
/// number. The earliest snapshot per book is the opener, the latest is the
/// current line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub game_id: String,
    pub book: String,
    pub bet_type: BetType,
    pub line: f64,
    pub recorded_at: DateTime<Utc>,
}

/// One moneyline price observation for a game at a book (American odds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub game_id: String,
    pub book: String,
    pub home_moneyline: i32,
    pub away_moneyline: i32,
    pub recorded_at: DateTime<Utc>,
}

/// Logical data sources a detector declares it reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    BettingSplits,
    LineHistory,
    Odds,
    Scores,
}

/// Half-open acceptance window for upcoming games
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.start && instant <= self.end
    }
}
