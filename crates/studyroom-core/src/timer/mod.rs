mod engine;
mod schedule;
mod session;

pub use engine::{FocusTimer, StopRequest, TimerSnapshot, TimerState};
pub use schedule::{Phase, TimerMode, TimerSettings, MAX_PHASE_MINUTES};
pub use session::{focus_score, StudySession, MIN_SESSION_SECS};
