//! Tip delivery: rate limiting and the delivery ledger.

mod policy;
mod record;
mod stats;

pub use policy::{DeliveryPolicy, FREQUENCY_WINDOW_DAYS};
pub use record::{Decision, DeliveryRecord, Outcome, SuppressionReason, TipAction};
pub use stats::DeliveryStats;
