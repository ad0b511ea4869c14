// Processing Context
// Immutable per-call parameters every detector run receives

use chrono::{DateTime, Duration, Utc};
use common::TimeWindow;
use serde::{Deserialize, Serialize};

/// Parameters for one processing pass, owned by the caller and read-only to
/// detectors. All relative-timing math goes through `processing_time` so
/// concurrent runs over the same batch agree on every classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingContext {
    /// Reference instant for all timing math
    pub processing_time: DateTime<Utc>,
    /// How far out a game may be to still be accepted, in minutes
    pub minutes_ahead: i64,
    /// Final confidence gate before a signal is emitted
    pub min_confidence_threshold: f64,
}

impl ProcessingContext {
    pub fn new(
        processing_time: DateTime<Utc>,
        minutes_ahead: i64,
        min_confidence_threshold: f64,
    ) -> Self {
        Self {
            processing_time,
            minutes_ahead,
            min_confidence_threshold,
        }
    }

    /// Context anchored at the current instant with default bounds
    pub fn now() -> Self {
        Self::new(Utc::now(), 1440, 0.6)
    }

    /// Acceptance window for upcoming games
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(
            self.processing_time,
            self.processing_time + Duration::minutes(self.minutes_ahead),
        )
    }

    /// Whole minutes from the reference instant to the given game time
    pub fn minutes_to_game(&self, game_time: DateTime<Utc>) -> i64 {
        (game_time - self.processing_time).num_minutes()
    }

    /// Minutes to game, if the game falls inside the acceptance window.
    /// `num_minutes` truncates, so a game under a minute out lands at zero
    /// and still qualifies; only games already started are rejected.
    pub fn eligible(&self, game_time: DateTime<Utc>) -> Option<i64> {
        let minutes = self.minutes_to_game(game_time);
        if minutes >= 0 && minutes <= self.minutes_ahead {
            Some(minutes)
        } else {
            None
        }
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_window() {
        let now = Utc::now();
        let ctx = ProcessingContext::new(now, 240, 0.6);

        assert_eq!(ctx.eligible(now + Duration::minutes(25)), Some(25));
        assert_eq!(ctx.eligible(now + Duration::minutes(240)), Some(240));
        assert_eq!(ctx.eligible(now + Duration::minutes(241)), None);
        assert_eq!(ctx.eligible(now - Duration::minutes(5)), None);
    }

    #[test]
    fn test_game_under_a_minute_out_still_eligible() {
        let now = Utc::now();
        let ctx = ProcessingContext::new(now, 240, 0.6);

        assert_eq!(ctx.eligible(now + Duration::seconds(30)), Some(0));
        assert_eq!(ctx.eligible(now - Duration::seconds(90)), None);
    }

    #[test]
    fn test_window_matches_minutes_ahead() {
        let now = Utc::now();
        let ctx = ProcessingContext::new(now, 60, 0.6);
        let window = ctx.window();
        assert_eq!(window.start, now);
        assert_eq!(window.end, now + Duration::minutes(60));
    }
}
