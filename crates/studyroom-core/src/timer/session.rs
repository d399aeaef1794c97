use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::TimerMode;

/// Runs shorter than this are not considered a meaningful study signal.
pub const MIN_SESSION_SECS: u64 = 60;

/// Immutable record of a finished focus-timer run, handed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub learner_id: String,
    pub subject: String,
    pub mode: TimerMode,
    /// Sum of all active (non-paused) intervals.
    pub elapsed_seconds: u64,
    pub duration_minutes: u64,
    pub completed_cycles: u32,
    /// Learner's 1-10 focus rating scaled to a 10-100 engagement score.
    pub focus_score: Option<u8>,
    #[serde(default)]
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Calendar date of `ended_at` in the learner's local offset.
    pub date: NaiveDate,
}

/// Scale a 1-10 focus rating to the 10-100 engagement range.
///
/// Out-of-range ratings are rejected rather than clamped.
pub fn focus_score(rating: u8) -> Option<u8> {
    (1..=10).contains(&rating).then(|| rating * 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_rating_scales_by_ten() {
        assert_eq!(focus_score(1), Some(10));
        assert_eq!(focus_score(7), Some(70));
        assert_eq!(focus_score(10), Some(100));
    }

    #[test]
    fn focus_rating_out_of_range_is_dropped() {
        assert_eq!(focus_score(0), None);
        assert_eq!(focus_score(11), None);
    }
}
