use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::EventLog;
use crate::tips::{LearnerContext, TipRule, TriggerKind};

/// Trigger inputs derived for one evaluation tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    /// Minutes since the start of the current unbroken activity window.
    pub time_spent_minutes: f64,
    /// Minutes since the last recorded interaction.
    pub inactivity_minutes: f64,
    pub hours_to_deadline: Option<f64>,
    pub engagement_percent: Option<f64>,
}

impl Signals {
    pub fn compute(
        log: &EventLog,
        ctx: &LearnerContext,
        now: DateTime<Utc>,
        activity_gap: Duration,
    ) -> Self {
        let time_spent_minutes = log
            .activity_window_start(now, activity_gap)
            .map_or(0.0, |start| minutes(now - start));
        Self {
            time_spent_minutes,
            inactivity_minutes: minutes(now - log.last_activity_time()),
            hours_to_deadline: ctx.hours_to_deadline,
            engagement_percent: ctx.engagement_percent,
        }
    }

    /// Whether the rule's trigger fires. A trigger on an absent signal does not.
    pub fn satisfies(&self, rule: &TipRule) -> bool {
        let v = rule.trigger_value;
        match rule.trigger {
            TriggerKind::TimeSpent => self.time_spent_minutes >= v,
            TriggerKind::Inactivity => self.inactivity_minutes >= v,
            TriggerKind::DeadlineApproaching => self.hours_to_deadline.map_or(false, |h| h <= v),
            TriggerKind::LowEngagement => self.engagement_percent.map_or(false, |e| e <= v),
            TriggerKind::Custom => true,
        }
    }
}

/// Non-negative fractional minutes.
fn minutes(d: Duration) -> f64 {
    (d.num_milliseconds().max(0) as f64) / 60_000.0
}
