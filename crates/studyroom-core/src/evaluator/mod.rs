//! Trigger evaluation and candidate selection.

mod engine;
mod selection;
mod signals;

pub use engine::{Nomination, SkipReason, TickInput, TriggerEvaluator};
pub use selection::{selection_weight, weighted_choice};
pub use signals::Signals;
