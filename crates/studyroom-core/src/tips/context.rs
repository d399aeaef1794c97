use serde::{Deserialize, Serialize};

/// Optional per-tick signals supplied by the assignment/grading side.
///
/// Any field may be absent; rules that depend on an absent signal are
/// simply ineligible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerContext {
    /// Hours until the active assignment is due.
    #[serde(default)]
    pub hours_to_deadline: Option<f64>,
    /// Rolling engagement score, 0-100.
    #[serde(default)]
    pub engagement_percent: Option<f64>,
    #[serde(default)]
    pub current_grade: Option<f64>,
}
