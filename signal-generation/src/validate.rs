// Candidate Validation
// Shape and range checks applied before any anomaly math runs. A failure
// here is treated exactly like a candidate skip.

use common::{BettingSplit, GameRecord, LineSnapshot, OddsSnapshot};

use crate::error::CandidateError;

fn invalid(message: String) -> CandidateError {
    CandidateError::Validation(message)
}

/// Basic checks on a game record
pub fn validate_game(game: &GameRecord) -> Result<(), CandidateError> {
    if game.game_id.is_empty() {
        return Err(invalid("game record missing game_id".to_string()));
    }
    if game.home_team.is_empty() || game.away_team.is_empty() {
        return Err(invalid(format!("game {} missing team names", game.game_id)));
    }
    Ok(())
}

/// Percentages must sit in [0, 100] and the split must carry volume
pub fn validate_split(split: &BettingSplit) -> Result<(), CandidateError> {
    if split.book.is_empty() {
        return Err(invalid(format!("split for {} missing book", split.game_id)));
    }
    if !(0.0..=100.0).contains(&split.money_percentage) {
        return Err(invalid(format!(
            "split for {} at {}: money_percentage {} outside [0, 100]",
            split.game_id, split.book, split.money_percentage
        )));
    }
    if !(0.0..=100.0).contains(&split.bet_percentage) {
        return Err(invalid(format!(
            "split for {} at {}: bet_percentage {} outside [0, 100]",
            split.game_id, split.book, split.bet_percentage
        )));
    }
    if split.volume == 0 {
        return Err(invalid(format!(
            "split for {} at {}: non-positive volume",
            split.game_id, split.book
        )));
    }
    Ok(())
}

/// Lines must be finite numbers
pub fn validate_snapshot(snapshot: &LineSnapshot) -> Result<(), CandidateError> {
    if snapshot.book.is_empty() {
        return Err(invalid(format!(
            "line snapshot for {} missing book",
            snapshot.game_id
        )));
    }
    if !snapshot.line.is_finite() {
        return Err(invalid(format!(
            "line snapshot for {} at {}: non-finite line",
            snapshot.game_id, snapshot.book
        )));
    }
    Ok(())
}

/// Moneyline prices of 0 or inside (-100, 100) are not valid American odds
pub fn validate_odds(odds: &OddsSnapshot) -> Result<(), CandidateError> {
    for price in [odds.home_moneyline, odds.away_moneyline] {
        if price.abs() < 100 {
            return Err(invalid(format!(
                "odds for {} at {}: {} is not a valid American price",
                odds.game_id, odds.book, price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::BetType;

    fn split(money: f64, bets: f64, volume: u32) -> BettingSplit {
        BettingSplit {
            game_id: "g1".to_string(),
            book: "Pinnacle".to_string(),
            bet_type: BetType::Spread,
            money_percentage: money,
            bet_percentage: bets,
            volume,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_split_passes() {
        assert!(validate_split(&split(68.0, 42.0, 750)).is_ok());
    }

    #[test]
    fn test_percentage_out_of_range_rejected() {
        assert!(validate_split(&split(150.0, 42.0, 750)).is_err());
        assert!(validate_split(&split(68.0, -3.0, 750)).is_err());
    }

    #[test]
    fn test_zero_volume_rejected() {
        assert!(validate_split(&split(68.0, 42.0, 0)).is_err());
    }

    #[test]
    fn test_bad_moneyline_rejected() {
        let odds = OddsSnapshot {
            game_id: "g1".to_string(),
            book: "FanDuel".to_string(),
            home_moneyline: -150,
            away_moneyline: 45,
            recorded_at: Utc::now(),
        };
        assert!(validate_odds(&odds).is_err());
    }
}
