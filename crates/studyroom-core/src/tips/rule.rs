//! Tip rule definitions.
//!
//! A rule binds a trigger condition, a category, a priority, a frequency
//! class and the content shown to the learner. Rules are authored by the
//! instructor and are read-only to the engine.

use serde::{Deserialize, Serialize};

use super::conditions::TipConditions;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipCategory {
    TimeManagement,
    Focus,
    Stress,
    Motivation,
}

impl TipCategory {
    pub const ALL: [TipCategory; 4] = [
        TipCategory::TimeManagement,
        TipCategory::Focus,
        TipCategory::Stress,
        TipCategory::Motivation,
    ];
}

/// Signal a rule reacts to. `trigger_value` units depend on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Minutes of continuous activity.
    TimeSpent,
    /// Minutes since the last interaction.
    Inactivity,
    /// Hours until the active assignment is due.
    DeadlineApproaching,
    /// Engagement percent at or below the value.
    LowEngagement,
    /// Fires on `conditions` alone.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Selection weight before the category multiplier.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// How often one rule may be shown to the same learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Always,
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Always
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipRule {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: TipCategory,
    pub trigger: TriggerKind,
    #[serde(default)]
    pub trigger_value: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: Option<TipConditions>,
}

fn default_true() -> bool {
    true
}

impl TipRule {
    /// Check the rule is well formed. Malformed rules are dropped from the
    /// active set at load time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::rule(&self.id, "id must not be empty"));
        }
        if !self.trigger_value.is_finite() {
            return Err(ValidationError::rule(&self.id, "trigger_value must be a finite number"));
        }
        if self.trigger_value < 0.0 {
            return Err(ValidationError::rule(
                &self.id,
                format!("trigger_value must not be negative (got {})", self.trigger_value),
            ));
        }
        if let Some(conditions) = &self.conditions {
            conditions
                .validate()
                .map_err(|message| ValidationError::rule(&self.id, message))?;
        }
        Ok(())
    }

    /// Base weight used by weighted selection.
    pub fn priority_weight(&self) -> f64 {
        self.priority.weight()
    }
}
