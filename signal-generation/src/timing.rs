// Timing Classification
// Pure mapping from minutes-to-event to one of nine ordered buckets, plus the
// configurable multiplier table the confidence composer reads

use serde::{Deserialize, Serialize};

/// How far out from the event an observation sits.
///
/// Ordered closest-to-event first. Classification is total: negative inputs
/// (game already underway) clamp to `UltraLate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimingCategory {
    UltraLate,
    ClosingHour,
    Closing2H,
    LateAfternoon,
    Late6H,
    SameDay,
    Early24H,
    Opening48H,
    VeryEarly,
}

impl TimingCategory {
    /// Classify minutes-to-event. Each breakpoint belongs to the
    /// closer-to-event bucket: exactly 30 minutes is `UltraLate`, exactly 60
    /// is `ClosingHour`, and so on.
    pub fn classify(minutes_to_event: i64) -> Self {
        match minutes_to_event {
            m if m <= 30 => TimingCategory::UltraLate,
            m if m <= 60 => TimingCategory::ClosingHour,
            m if m <= 120 => TimingCategory::Closing2H,
            m if m <= 240 => TimingCategory::LateAfternoon,
            m if m <= 360 => TimingCategory::Late6H,
            m if m <= 720 => TimingCategory::SameDay,
            m if m <= 1440 => TimingCategory::Early24H,
            m if m <= 2880 => TimingCategory::Opening48H,
            _ => TimingCategory::VeryEarly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimingCategory::UltraLate => "ultra_late",
            TimingCategory::ClosingHour => "closing_hour",
            TimingCategory::Closing2H => "closing_2h",
            TimingCategory::LateAfternoon => "late_afternoon",
            TimingCategory::Late6H => "late_6h",
            TimingCategory::SameDay => "same_day",
            TimingCategory::Early24H => "early_24h",
            TimingCategory::Opening48H => "opening_48h",
            TimingCategory::VeryEarly => "very_early",
        }
    }
}

/// Per-category confidence multipliers.
///
/// Configuration, not policy: defaults weight closer-to-event observations
/// higher, but a caller may supply its own table at composer construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingWeights {
    pub ultra_late: f64,
    pub closing_hour: f64,
    pub closing_2h: f64,
    pub late_afternoon: f64,
    pub late_6h: f64,
    pub same_day: f64,
    pub early_24h: f64,
    pub opening_48h: f64,
    pub very_early: f64,
}

impl TimingWeights {
    pub fn multiplier(&self, category: TimingCategory) -> f64 {
        match category {
            TimingCategory::UltraLate => self.ultra_late,
            TimingCategory::ClosingHour => self.closing_hour,
            TimingCategory::Closing2H => self.closing_2h,
            TimingCategory::LateAfternoon => self.late_afternoon,
            TimingCategory::Late6H => self.late_6h,
            TimingCategory::SameDay => self.same_day,
            TimingCategory::Early24H => self.early_24h,
            TimingCategory::Opening48H => self.opening_48h,
            TimingCategory::VeryEarly => self.very_early,
        }
    }
}

impl Default for TimingWeights {
    fn default() -> Self {
        Self {
            ultra_late: 1.15,
            closing_hour: 1.10,
            closing_2h: 1.08,
            late_afternoon: 1.05,
            late_6h: 1.02,
            same_day: 1.00,
            early_24h: 0.97,
            opening_48h: 0.95,
            very_early: 0.92,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoints_belong_to_closer_bucket() {
        assert_eq!(TimingCategory::classify(30), TimingCategory::UltraLate);
        assert_eq!(TimingCategory::classify(60), TimingCategory::ClosingHour);
        assert_eq!(TimingCategory::classify(120), TimingCategory::Closing2H);
        assert_eq!(TimingCategory::classify(240), TimingCategory::LateAfternoon);
        assert_eq!(TimingCategory::classify(360), TimingCategory::Late6H);
        assert_eq!(TimingCategory::classify(720), TimingCategory::SameDay);
        assert_eq!(TimingCategory::classify(1440), TimingCategory::Early24H);
        assert_eq!(TimingCategory::classify(2880), TimingCategory::Opening48H);
    }

    #[test]
    fn test_one_past_each_breakpoint() {
        assert_eq!(TimingCategory::classify(31), TimingCategory::ClosingHour);
        assert_eq!(TimingCategory::classify(61), TimingCategory::Closing2H);
        assert_eq!(TimingCategory::classify(121), TimingCategory::LateAfternoon);
        assert_eq!(TimingCategory::classify(241), TimingCategory::Late6H);
        assert_eq!(TimingCategory::classify(361), TimingCategory::SameDay);
        assert_eq!(TimingCategory::classify(721), TimingCategory::Early24H);
        assert_eq!(TimingCategory::classify(1441), TimingCategory::Opening48H);
        assert_eq!(TimingCategory::classify(2881), TimingCategory::VeryEarly);
    }

    #[test]
    fn test_total_over_negative_input() {
        assert_eq!(TimingCategory::classify(-15), TimingCategory::UltraLate);
        assert_eq!(TimingCategory::classify(0), TimingCategory::UltraLate);
    }

    #[test]
    fn test_default_weights_favor_late() {
        let weights = TimingWeights::default();
        assert!(
            weights.multiplier(TimingCategory::UltraLate)
                > weights.multiplier(TimingCategory::VeryEarly)
        );
    }
}
