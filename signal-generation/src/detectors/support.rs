// Shared Observation Helpers
// Grouping and bookkeeping every detector needs before its own anomaly math

use common::{BetType, BettingSplit, LineSnapshot, Side};
use std::collections::HashMap;

/// The home-equivalent side of a market (over for totals)
pub fn home_side(bet_type: BetType) -> Side {
    match bet_type {
        BetType::Total => Side::Over,
        _ => Side::Home,
    }
}

/// Side the market moved toward for a signed line delta.
///
/// Spreads quote the home handicap, so a falling line means home money;
/// totals rise when the over is bet.
pub fn moved_toward(bet_type: BetType, delta: f64) -> Side {
    match bet_type {
        BetType::Total => {
            if delta >= 0.0 {
                Side::Over
            } else {
                Side::Under
            }
        }
        _ => {
            if delta <= 0.0 {
                Side::Home
            } else {
                Side::Away
            }
        }
    }
}

/// Latest split per book for one game/market, sorted by book name for
/// deterministic iteration
pub fn latest_splits<'a>(
    splits: &'a [BettingSplit],
    game_id: &str,
    bet_type: BetType,
) -> Vec<&'a BettingSplit> {
    let mut latest: HashMap<&str, &BettingSplit> = HashMap::new();
    for split in splits
        .iter()
        .filter(|s| s.game_id == game_id && s.bet_type == bet_type)
    {
        match latest.get(split.book.as_str()) {
            Some(current) if current.recorded_at >= split.recorded_at => {}
            _ => {
                latest.insert(split.book.as_str(), split);
            }
        }
    }
    let mut out: Vec<&BettingSplit> = latest.into_values().collect();
    out.sort_by(|a, b| a.book.cmp(&b.book));
    out
}

/// All splits for one game/market at one book, in recording order
pub fn split_history<'a>(
    splits: &'a [BettingSplit],
    game_id: &str,
    bet_type: BetType,
    book: &str,
) -> Vec<&'a BettingSplit> {
    let mut out: Vec<&BettingSplit> = splits
        .iter()
        .filter(|s| s.game_id == game_id && s.bet_type == bet_type && s.book == book)
        .collect();
    out.sort_by_key(|s| s.recorded_at);
    out
}

/// Books that reported any split for one game/market
pub fn books_for<'a>(splits: &'a [BettingSplit], game_id: &str, bet_type: BetType) -> Vec<&'a str> {
    let mut books: Vec<&str> = splits
        .iter()
        .filter(|s| s.game_id == game_id && s.bet_type == bet_type)
        .map(|s| s.book.as_str())
        .collect();
    books.sort();
    books.dedup();
    books
}

/// (opening, current) snapshot per book for one game/market, keyed by book
pub fn book_paths<'a>(
    lines: &'a [LineSnapshot],
    game_id: &str,
    bet_type: BetType,
) -> HashMap<&'a str, (&'a LineSnapshot, &'a LineSnapshot)> {
    let mut paths: HashMap<&str, (&LineSnapshot, &LineSnapshot)> = HashMap::new();
    for snap in lines
        .iter()
        .filter(|l| l.game_id == game_id && l.bet_type == bet_type)
    {
        paths
            .entry(snap.book.as_str())
            .and_modify(|(open, current)| {
                if snap.recorded_at < open.recorded_at {
                    *open = snap;
                }
                if snap.recorded_at >= current.recorded_at {
                    *current = snap;
                }
            })
            .or_insert((snap, snap));
    }
    paths
}

/// Snapshots for one game/market at one book, in recording order
pub fn line_path<'a>(
    lines: &'a [LineSnapshot],
    game_id: &str,
    bet_type: BetType,
    book: &str,
) -> Vec<&'a LineSnapshot> {
    let mut out: Vec<&LineSnapshot> = lines
        .iter()
        .filter(|l| l.game_id == game_id && l.bet_type == bet_type && l.book == book)
        .collect();
    out.sort_by_key(|l| l.recorded_at);
    out
}

/// Implied win probability of an American moneyline price, in percent
pub fn implied_probability(moneyline: i32) -> f64 {
    if moneyline < 0 {
        let risk = -moneyline as f64;
        risk / (risk + 100.0) * 100.0
    } else {
        100.0 / (moneyline as f64 + 100.0) * 100.0
    }
}

/// Volume-weighted average bet percentage plus total volume
pub fn weighted_bet_percentage(splits: &[&BettingSplit]) -> Option<(f64, u32)> {
    let total: u64 = splits.iter().map(|s| s.volume as u64).sum();
    if total == 0 {
        return None;
    }
    let weighted: f64 = splits
        .iter()
        .map(|s| s.bet_percentage * s.volume as f64)
        .sum::<f64>()
        / total as f64;
    Some((weighted, total as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn split(book: &str, minutes_ago: i64, money: f64) -> BettingSplit {
        BettingSplit {
            game_id: "g1".to_string(),
            book: book.to_string(),
            bet_type: BetType::Spread,
            money_percentage: money,
            bet_percentage: 50.0,
            volume: 100,
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_latest_split_wins_per_book() {
        let splits = vec![split("Pinnacle", 60, 55.0), split("Pinnacle", 5, 61.0)];
        let latest = latest_splits(&splits, "g1", BetType::Spread);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].money_percentage, 61.0);
    }

    #[test]
    fn test_moved_toward_sides() {
        assert_eq!(moved_toward(BetType::Spread, -1.5), Side::Home);
        assert_eq!(moved_toward(BetType::Spread, 2.0), Side::Away);
        assert_eq!(moved_toward(BetType::Total, 1.0), Side::Over);
        assert_eq!(moved_toward(BetType::Total, -0.5), Side::Under);
    }

    #[test]
    fn test_implied_probability() {
        assert!((implied_probability(-150) - 60.0).abs() < 1e-9);
        assert!((implied_probability(150) - 40.0).abs() < 1e-9);
        assert!((implied_probability(100) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_book_paths_open_and_current() {
        let now = Utc::now();
        let snap = |minutes_ago: i64, line: f64| LineSnapshot {
            game_id: "g1".to_string(),
            book: "DraftKings".to_string(),
            bet_type: BetType::Spread,
            line,
            recorded_at: now - Duration::minutes(minutes_ago),
        };
        let lines = vec![snap(120, -3.0), snap(10, -4.5), snap(60, -3.5)];
        let paths = book_paths(&lines, "g1", BetType::Spread);
        let (open, current) = paths["DraftKings"];
        assert_eq!(open.line, -3.0);
        assert_eq!(current.line, -4.5);
    }
}
