use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipAction {
    Shown,
    Dismissed,
    Applied,
}

/// Learner response to a displayed tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Dismissed,
    Applied,
}

impl From<Outcome> for TipAction {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Dismissed => TipAction::Dismissed,
            Outcome::Applied => TipAction::Applied,
        }
    }
}

/// One row of the delivery ledger. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub tip_id: String,
    pub learner_id: String,
    /// When the action happened. For `shown` rows this is the display time.
    pub shown_at: DateTime<Utc>,
    pub action: TipAction,
}

/// Why a candidate was not shown. Checks run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    GlobalDisabled,
    DailyCapReached,
    Cooldown,
    FrequencyExhausted,
}

impl SuppressionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuppressionReason::GlobalDisabled => "global_disabled",
            SuppressionReason::DailyCapReached => "daily_cap_reached",
            SuppressionReason::Cooldown => "cooldown",
            SuppressionReason::FrequencyExhausted => "frequency_exhausted",
        }
    }
}

impl std::fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Show,
    Suppressed(SuppressionReason),
}

impl Decision {
    pub fn is_show(self) -> bool {
        matches!(self, Decision::Show)
    }
}
