//! Read-only view over the configured tip rules and category weights.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::context::LearnerContext;
use super::rule::{Frequency, Priority, TipCategory, TipRule, TriggerKind};
use crate::error::ValidationError;

/// Per-category switch and selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySetting {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_true() -> bool {
    true
}
fn default_weight() -> f64 {
    1.0
}

impl Default for CategorySetting {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
        }
    }
}

/// Validated rule set plus category settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TipCatalog {
    rules: Vec<TipRule>,
    categories: BTreeMap<TipCategory, CategorySetting>,
}

impl TipCatalog {
    /// Build a catalog, dropping rules that fail validation.
    ///
    /// Rejected rules are logged and returned alongside the catalog; a bad
    /// rule never prevents the others from loading. Later rules that reuse
    /// an id are rejected.
    pub fn build(
        rules: Vec<TipRule>,
        categories: BTreeMap<TipCategory, CategorySetting>,
    ) -> (Self, Vec<ValidationError>) {
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(rules.len());

        for rule in rules {
            let result = rule.validate().and_then(|()| {
                if seen.contains(&rule.id) {
                    Err(ValidationError::rule(&rule.id, "duplicate rule id"))
                } else {
                    Ok(())
                }
            });
            match result {
                Ok(()) => {
                    seen.insert(rule.id.clone());
                    accepted.push(rule);
                }
                Err(e) => {
                    warn!(error = %e, "dropping invalid tip rule");
                    rejected.push(e);
                }
            }
        }

        let categories = categories
            .into_iter()
            .map(|(category, mut setting)| {
                if !(setting.weight.is_finite() && setting.weight > 0.0) {
                    warn!(?category, weight = setting.weight, "category weight must be > 0, using 1.0");
                    setting.weight = 1.0;
                }
                (category, setting)
            })
            .collect();

        (
            Self {
                rules: accepted,
                categories,
            },
            rejected,
        )
    }

    pub fn rules(&self) -> &[TipRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&TipRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_active).count()
    }

    /// Settings for `category`; unlisted categories are enabled with weight 1.
    pub fn category(&self, category: TipCategory) -> CategorySetting {
        self.categories.get(&category).cloned().unwrap_or_default()
    }

    pub fn category_weight(&self, category: TipCategory) -> f64 {
        self.category(category).weight
    }

    /// Rules that may fire for this learner right now.
    ///
    /// Filters on `is_active`, the category switch and any declared
    /// conditions. Never fails; an empty result means nothing applies.
    pub fn eligible_rules(
        &self,
        now: DateTime<FixedOffset>,
        ctx: &LearnerContext,
        adapt_to_performance: bool,
    ) -> Vec<&TipRule> {
        self.rules
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| self.category(r.category).enabled)
            .filter(|r| {
                r.conditions
                    .as_ref()
                    .map_or(true, |c| c.matches(ctx, now, adapt_to_performance))
            })
            .collect()
    }
}

impl Default for TipCatalog {
    /// The stock rule set shipped with the application.
    fn default() -> Self {
        let (catalog, _) = Self::build(default_rules(), default_categories());
        catalog
    }
}

pub fn default_categories() -> BTreeMap<TipCategory, CategorySetting> {
    [
        (TipCategory::TimeManagement, 1.0),
        (TipCategory::Focus, 1.0),
        (TipCategory::Stress, 1.2),
        (TipCategory::Motivation, 0.8),
    ]
    .into_iter()
    .map(|(c, weight)| (c, CategorySetting { enabled: true, weight }))
    .collect()
}

pub fn default_rules() -> Vec<TipRule> {
    vec![
        TipRule {
            id: "1".into(),
            title: "Pomodoro technique".into(),
            content: "How about a break? You have been studying for a while. \
                      The Pomodoro technique suggests 25 minutes of focus followed by 5 minutes of rest."
                .into(),
            category: TipCategory::TimeManagement,
            trigger: TriggerKind::TimeSpent,
            trigger_value: 25.0,
            priority: Priority::Medium,
            frequency: Frequency::Always,
            is_active: true,
            conditions: None,
        },
        TipRule {
            id: "2".into(),
            title: "Stay focused".into(),
            content: "Looks like you have been inactive for a while. \
                      Why not pick a small goal and get back to it?"
                .into(),
            category: TipCategory::Focus,
            trigger: TriggerKind::Inactivity,
            trigger_value: 10.0,
            priority: Priority::High,
            frequency: Frequency::Always,
            is_active: true,
            conditions: None,
        },
        TipRule {
            id: "3".into(),
            title: "Deadline approaching".into(),
            content: "Heads up! One of your assignments is due soon. \
                      Plan your time so you can finish it without stress."
                .into(),
            category: TipCategory::Stress,
            trigger: TriggerKind::DeadlineApproaching,
            trigger_value: 24.0,
            priority: Priority::High,
            frequency: Frequency::Once,
            is_active: true,
            conditions: None,
        },
        TipRule {
            id: "4".into(),
            title: "You can do it!".into(),
            content: "Keep going! Every bit of progress counts. \
                      Celebrate what you have achieved and stay motivated."
                .into(),
            category: TipCategory::Motivation,
            trigger: TriggerKind::LowEngagement,
            trigger_value: 30.0,
            priority: Priority::Medium,
            frequency: Frequency::Daily,
            is_active: true,
            conditions: None,
        },
    ]
}
