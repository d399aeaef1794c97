use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delivery::{SuppressionReason, TipAction};
use crate::tips::TipCategory;
use crate::timer::{Phase, StudySession, TimerMode};

/// Every state change in a learner session produces an Event.
/// The UI subscribes to them; reporting collaborators may log them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        phase: Phase,
        /// `None` for the unbounded stopwatch.
        duration_secs: Option<u64>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: Option<u64>,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: Option<u64>,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        from: Phase,
        to: Phase,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    /// Timer returned to idle. `session` is present when the run was long
    /// enough and had a subject.
    TimerStopped {
        elapsed_secs: u64,
        session: Option<StudySession>,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    TipShown {
        tip_id: String,
        title: String,
        category: TipCategory,
        at: DateTime<Utc>,
    },
    TipSuppressed {
        tip_id: String,
        reason: SuppressionReason,
        at: DateTime<Utc>,
    },
    TipOutcome {
        tip_id: String,
        action: TipAction,
        at: DateTime<Utc>,
    },
    ConfigReloaded {
        active_rules: usize,
        at: DateTime<Utc>,
    },
}
