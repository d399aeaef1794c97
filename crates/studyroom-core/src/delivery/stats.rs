use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a learner's tip history, for quick-stats views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Tips shown on the current local calendar day.
    pub shown_today: u64,
    /// Tips shown since the policy was created, compaction included.
    pub shown_total: u64,
    pub dismissed: u64,
    pub applied: u64,
    pub last_shown_at: Option<DateTime<Utc>>,
}

impl DeliveryStats {
    /// Share of shown tips the learner applied, 0-100.
    pub fn apply_rate(&self) -> f64 {
        if self.shown_total == 0 {
            return 0.0;
        }
        self.applied as f64 / self.shown_total as f64 * 100.0
    }
}
