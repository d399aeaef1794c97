//! Learner activity tracking.
//!
//! The presentation layer pushes one [`InteractionEvent`] per tracked user
//! action; the [`EventLog`] keeps them in timestamp order for the lifetime of
//! the learner's session.

mod event;
mod log;
mod tracker;

pub use event::{InteractionEvent, InteractionKind};
pub use log::EventLog;
pub use tracker::ActivityTracker;
