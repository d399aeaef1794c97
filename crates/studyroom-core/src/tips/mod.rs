//! Tip catalog: instructor-authored coaching rules.
//!
//! Rules are loaded once per configuration snapshot, validated, and then
//! queried read-only by the trigger evaluator through
//! [`TipCatalog::eligible_rules`].

mod catalog;
mod conditions;
mod context;
mod rule;

pub use catalog::{default_categories, default_rules, CategorySetting, TipCatalog};
pub use conditions::{TimeWindow, TipConditions};
pub use context::LearnerContext;
pub use rule::{Frequency, Priority, TipCategory, TipRule, TriggerKind};
