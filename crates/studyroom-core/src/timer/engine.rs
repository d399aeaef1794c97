//! Focus timer state machine.
//!
//! Like the rest of the core, the timer has no internal thread. Time is
//! passed in as a monotonic [`Instant`] so that wall-clock jumps (system
//! sleep, NTP corrections) never distort remaining or elapsed time. The
//! owner calls [`FocusTimer::tick`] whenever [`FocusTimer::next_deadline`]
//! passes; the learner session actor does this by sleeping on the deadline.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running --(phase elapsed)--> Running (next Pomodoro phase) | Completed (custom)
//! any -> Idle via stop() / reset()
//! ```
//!
//! Pomodoro phases: `Work -> ShortBreak | LongBreak -> Work -> ...`, with a
//! long break after every `cycles_before_long_break` work phases.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::schedule::{Phase, TimerMode, TimerSettings};
use super::session::{focus_score, StudySession, MIN_SESSION_SECS};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    /// Suspended variant of the current phase.
    Paused,
    /// A custom countdown ran out; waiting for the learner to stop it.
    Completed,
}

/// Copy of the timer's externally visible state, published to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub phase: Phase,
    pub state: TimerState,
    pub remaining_secs: Option<u64>,
    pub elapsed_seconds: u64,
    pub completed_cycles: u32,
    pub subject: String,
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            mode: TimerMode::Pomodoro,
            phase: Phase::Idle,
            state: TimerState::Idle,
            remaining_secs: None,
            elapsed_seconds: 0,
            completed_cycles: 0,
            subject: String::new(),
        }
    }
}

/// What the learner supplies when ending a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopRequest {
    /// 1-10 self-reported focus.
    pub focus_rating: Option<u8>,
    pub notes: String,
}

/// Focus timer for one learner.
#[derive(Debug, Clone)]
pub struct FocusTimer {
    learner_id: String,
    settings: TimerSettings,
    utc_offset: FixedOffset,
    mode: TimerMode,
    state: TimerState,
    phase: Phase,
    subject: String,
    /// Remaining time in the current phase as of `anchor`. `None` = unbounded.
    remaining: Option<Duration>,
    /// Instant the current running stretch was last accounted from.
    anchor: Option<Instant>,
    /// Active time already accounted for, across all phases.
    elapsed: Duration,
    completed_cycles: u32,
    started_at: Option<DateTime<Utc>>,
    /// Completions discovered while serving a command rather than a tick.
    backlog: Vec<Event>,
}

impl FocusTimer {
    pub fn new(
        learner_id: impl Into<String>,
        settings: TimerSettings,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            settings: checked_settings(settings),
            utc_offset,
            mode: TimerMode::Pomodoro,
            state: TimerState::Idle,
            phase: Phase::Idle,
            subject: String::new(),
            remaining: None,
            anchor: None,
            elapsed: Duration::ZERO,
            completed_cycles: 0,
            started_at: None,
            backlog: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// True while a Work phase is actively counting down.
    pub fn is_working(&self) -> bool {
        self.state == TimerState::Running && self.phase == Phase::Work
    }

    /// Total active time as of `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.state, self.anchor) {
            (TimerState::Running, Some(anchor)) => {
                self.elapsed + now.saturating_duration_since(anchor)
            }
            _ => self.elapsed,
        }
    }

    /// Remaining time in the current phase as of `now`.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let remaining = self.remaining?;
        match (self.state, self.anchor) {
            (TimerState::Running, Some(anchor)) => {
                Some(remaining.saturating_sub(now.saturating_duration_since(anchor)))
            }
            _ => Some(remaining),
        }
    }

    /// Instant at which the current phase completes, if it can complete.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.state, self.anchor, self.remaining) {
            (TimerState::Running, Some(anchor), Some(remaining)) => anchor.checked_add(remaining),
            _ => None,
        }
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            phase: self.phase,
            state: self.state,
            remaining_secs: self.remaining(now).map(|d| d.as_secs()),
            elapsed_seconds: self.elapsed(now).as_secs(),
            completed_cycles: self.completed_cycles,
            subject: self.subject.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Replace phase lengths. Takes effect from the next phase.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = checked_settings(settings);
    }

    /// Offset used to date recorded sessions.
    pub fn set_utc_offset(&mut self, utc_offset: FixedOffset) {
        self.utc_offset = utc_offset;
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn start(&mut self, mode: TimerMode, subject: impl Into<String>, now: Instant) -> Option<Event> {
        if self.state != TimerState::Idle {
            return None; // Already active.
        }
        if let Err(e) = mode.validate() {
            warn!(learner_id = %self.learner_id, error = %e, "ignoring timer start");
            return None;
        }

        let phase = mode.first_phase();
        self.mode = mode;
        self.phase = phase;
        self.state = TimerState::Running;
        self.subject = subject.into();
        self.remaining = self.settings.duration_for(mode, phase);
        self.anchor = Some(now);
        self.elapsed = Duration::ZERO;
        self.completed_cycles = 0;
        self.started_at = Some(Utc::now());
        self.backlog.clear();

        Some(Event::TimerStarted {
            mode,
            phase,
            duration_secs: self.remaining.map(|d| d.as_secs()),
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self, now: Instant) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.catch_up(now);
        if self.state != TimerState::Running {
            // The countdown ran out before the pause arrived.
            return None;
        }
        self.flush_elapsed(now);
        self.state = TimerState::Paused;
        self.anchor = None;
        Some(Event::TimerPaused {
            phase: self.phase,
            remaining_secs: self.remaining.map(|d| d.as_secs()),
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self, now: Instant) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.state = TimerState::Running;
        self.anchor = Some(now);
        Some(Event::TimerResumed {
            phase: self.phase,
            remaining_secs: self.remaining.map(|d| d.as_secs()),
            at: Utc::now(),
        })
    }

    /// Call when `next_deadline()` has passed. Returns one
    /// `PhaseCompleted` per phase that ended at or before `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.backlog);
        self.advance(now, &mut events);
        events
    }

    /// End the current bounded phase immediately.
    pub fn complete_phase(&mut self, now: Instant) -> Option<Event> {
        if self.state != TimerState::Running || self.remaining.is_none() {
            return None;
        }
        self.catch_up(now);
        if self.state != TimerState::Running {
            return None;
        }
        self.flush_elapsed(now);
        Some(self.finish_phase(now))
    }

    /// Return to idle, emitting a study session when the run counts.
    pub fn stop(&mut self, now: Instant, request: StopRequest) -> Option<Event> {
        if self.state == TimerState::Idle {
            return None;
        }
        self.catch_up(now);
        if self.state == TimerState::Running {
            self.flush_elapsed(now);
        }

        let elapsed_secs = self.elapsed.as_secs();
        let subject = self.subject.trim().to_string();
        let ended_at = Utc::now();

        let session = if elapsed_secs >= MIN_SESSION_SECS && !subject.is_empty() {
            let focus = request.focus_rating.and_then(|rating| {
                let score = focus_score(rating);
                if score.is_none() {
                    warn!(learner_id = %self.learner_id, rating, "focus rating outside 1-10, dropping");
                }
                score
            });
            Some(StudySession {
                id: Uuid::new_v4().to_string(),
                learner_id: self.learner_id.clone(),
                subject,
                mode: self.mode,
                elapsed_seconds: elapsed_secs,
                duration_minutes: elapsed_secs / 60,
                completed_cycles: self.completed_cycles,
                focus_score: focus,
                notes: request.notes.trim().to_string(),
                started_at: self.started_at.unwrap_or(ended_at),
                ended_at,
                date: ended_at.with_timezone(&self.utc_offset).date_naive(),
            })
        } else {
            debug!(
                learner_id = %self.learner_id,
                elapsed_secs,
                "discarding short or unnamed study run"
            );
            None
        };

        self.clear();
        Some(Event::TimerStopped {
            elapsed_secs,
            session,
            at: ended_at,
        })
    }

    /// Return to idle, discarding elapsed time and cycles.
    pub fn reset(&mut self) -> Option<Event> {
        self.clear();
        self.backlog.clear();
        Some(Event::TimerReset { at: Utc::now() })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn catch_up(&mut self, now: Instant) {
        let mut events = Vec::new();
        self.advance(now, &mut events);
        self.backlog.extend(events);
    }

    /// Complete every phase whose deadline is at or before `now`.
    /// Each following phase is anchored at the exact completion instant.
    fn advance(&mut self, now: Instant, events: &mut Vec<Event>) {
        while let Some(deadline) = self.next_deadline() {
            if now < deadline {
                break;
            }
            self.flush_elapsed(deadline);
            events.push(self.finish_phase(deadline));
            if self.remaining.map_or(false, |r| r.is_zero()) {
                break;
            }
        }
    }

    fn flush_elapsed(&mut self, now: Instant) {
        if let Some(anchor) = self.anchor {
            let run = now.saturating_duration_since(anchor);
            self.elapsed += run;
            self.remaining = self.remaining.map(|r| r.saturating_sub(run));
            self.anchor = Some(now);
        }
    }

    fn finish_phase(&mut self, at: Instant) -> Event {
        let from = self.phase;
        match self.mode {
            TimerMode::Pomodoro => {
                let to = if from == Phase::Work {
                    let next = self.settings.break_after_work(self.completed_cycles);
                    self.completed_cycles += 1;
                    next
                } else {
                    Phase::Work
                };
                self.phase = to;
                self.remaining = self.settings.duration_for(self.mode, to);
                self.anchor = Some(at);
            }
            TimerMode::Custom { .. } | TimerMode::Stopwatch => {
                self.state = TimerState::Completed;
                self.remaining = Some(Duration::ZERO);
                self.anchor = None;
            }
        }
        debug!(learner_id = %self.learner_id, ?from, to = ?self.phase, "phase completed");
        Event::PhaseCompleted {
            from,
            to: self.phase,
            completed_cycles: self.completed_cycles,
            at: Utc::now(),
        }
    }

    fn clear(&mut self) {
        self.state = TimerState::Idle;
        self.phase = Phase::Idle;
        self.remaining = None;
        self.anchor = None;
        self.elapsed = Duration::ZERO;
        self.completed_cycles = 0;
        self.started_at = None;
    }
}

fn checked_settings(settings: TimerSettings) -> TimerSettings {
    match settings.validate() {
        Ok(()) => settings,
        Err(e) => {
            warn!(error = %e, "invalid timer settings, using defaults");
            TimerSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::MAX_PHASE_MINUTES;

    fn timer() -> FocusTimer {
        FocusTimer::new("learner-1", TimerSettings::default(), FixedOffset::east_opt(0).unwrap())
    }

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn start_pause_resume() {
        let t0 = Instant::now();
        let mut timer = timer();
        assert_eq!(timer.state(), TimerState::Idle);

        assert!(timer.start(TimerMode::Pomodoro, "math", t0).is_some());
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.phase(), Phase::Work);

        assert!(timer.pause(t0 + mins(10)).is_some());
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.phase(), Phase::Work);
        assert_eq!(timer.remaining(t0 + mins(60)), Some(mins(15)));

        assert!(timer.resume(t0 + mins(60)).is_some());
        assert_eq!(timer.next_deadline(), Some(t0 + mins(75)));
    }

    #[test]
    fn oversized_custom_countdown_is_refused() {
        let t0 = Instant::now();
        let mut timer = timer();

        let huge = TimerMode::Custom { minutes: u64::MAX / 60 };
        assert!(timer.start(huge, "essay", t0).is_none());
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.next_deadline(), None);

        let day = TimerMode::Custom { minutes: MAX_PHASE_MINUTES };
        assert!(timer.start(day, "essay", t0).is_some());
        assert_eq!(timer.next_deadline(), Some(t0 + mins(MAX_PHASE_MINUTES)));
    }

    #[test]
    fn start_twice_is_noop() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "", t0);
        assert!(timer.start(TimerMode::Pomodoro, "", t0).is_none());
        assert_eq!(timer.mode(), TimerMode::Stopwatch);
    }

    #[test]
    fn pause_while_idle_is_noop() {
        let mut timer = timer();
        assert!(timer.pause(Instant::now()).is_none());
        assert!(timer.resume(Instant::now()).is_none());
    }

    #[test]
    fn work_completion_moves_to_short_break() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);

        let events = timer.tick(t0 + mins(25));
        assert_eq!(events.len(), 1);
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.completed_cycles(), 1);
        assert_eq!(timer.next_deadline(), Some(t0 + mins(30)));
    }

    #[test]
    fn late_tick_replays_every_completion() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);

        // Work 25 + break 5 + work 25 = 55 minutes, 2 minutes into the next break.
        let events = timer.tick(t0 + mins(57));
        assert_eq!(events.len(), 3);
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.completed_cycles(), 2);
        assert_eq!(timer.remaining(t0 + mins(57)), Some(mins(3)));
        assert_eq!(timer.elapsed(t0 + mins(57)), mins(57));
    }

    #[test]
    fn stopwatch_never_completes() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "reading", t0);
        assert_eq!(timer.next_deadline(), None);
        assert!(timer.tick(t0 + mins(600)).is_empty());
        assert_eq!(timer.phase(), Phase::Running);
    }

    #[test]
    fn custom_completion_waits_for_stop() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Custom { minutes: 10 }, "essay", t0);

        let events = timer.tick(t0 + mins(12));
        assert_eq!(events.len(), 1);
        assert_eq!(timer.state(), TimerState::Completed);
        assert_eq!(timer.next_deadline(), None);

        let stopped = timer.stop(t0 + mins(20), StopRequest::default());
        match stopped {
            Some(Event::TimerStopped { elapsed_secs, session, .. }) => {
                assert_eq!(elapsed_secs, 600);
                assert_eq!(session.unwrap().duration_minutes, 10);
            }
            other => panic!("Expected TimerStopped, got {other:?}"),
        }
    }

    #[test]
    fn stop_emits_session_with_scaled_rating() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "  biology ", t0);
        let event = timer.stop(
            t0 + Duration::from_secs(125),
            StopRequest {
                focus_rating: Some(8),
                notes: "chapter 3".into(),
            },
        );

        let Some(Event::TimerStopped { session: Some(session), .. }) = event else {
            panic!("Expected a recorded session");
        };
        assert_eq!(session.subject, "biology");
        assert_eq!(session.elapsed_seconds, 125);
        assert_eq!(session.duration_minutes, 2);
        assert_eq!(session.focus_score, Some(80));
        assert_eq!(session.notes, "chapter 3");
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn stop_discards_short_or_unnamed_runs() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "history", t0);
        let short = timer.stop(t0 + Duration::from_secs(59), StopRequest::default());
        assert!(matches!(short, Some(Event::TimerStopped { session: None, .. })));

        timer.start(TimerMode::Stopwatch, "   ", t0);
        let unnamed = timer.stop(t0 + mins(30), StopRequest::default());
        assert!(matches!(unnamed, Some(Event::TimerStopped { session: None, .. })));
    }

    #[test]
    fn exactly_one_minute_counts() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "history", t0);
        let event = timer.stop(t0 + Duration::from_secs(60), StopRequest::default());
        assert!(matches!(event, Some(Event::TimerStopped { session: Some(_), .. })));
    }

    #[test]
    fn invalid_rating_is_dropped_but_session_kept() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Stopwatch, "history", t0);
        let event = timer.stop(
            t0 + mins(5),
            StopRequest {
                focus_rating: Some(12),
                notes: String::new(),
            },
        );
        let Some(Event::TimerStopped { session: Some(session), .. }) = event else {
            panic!("Expected a recorded session");
        };
        assert_eq!(session.focus_score, None);
    }

    #[test]
    fn reset_discards_everything() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);
        timer.tick(t0 + mins(26));
        assert_eq!(timer.completed_cycles(), 1);

        assert!(matches!(timer.reset(), Some(Event::TimerReset { .. })));
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.phase(), Phase::Idle);
        assert_eq!(timer.completed_cycles(), 0);
        assert_eq!(timer.elapsed(t0 + mins(30)), Duration::ZERO);
        assert_eq!(timer.next_deadline(), None);
    }

    #[test]
    fn pause_after_deadline_reports_completion_on_next_tick() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);

        // Pause arrives 1 minute after work should have ended.
        assert!(timer.pause(t0 + mins(26)).is_some());
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.remaining(t0 + mins(30)), Some(mins(4)));

        let events = timer.tick(t0 + mins(30));
        assert!(matches!(
            events.as_slice(),
            [Event::PhaseCompleted { from: Phase::Work, to: Phase::ShortBreak, .. }]
        ));
    }

    #[test]
    fn complete_phase_skips_ahead() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);
        assert!(timer.complete_phase(t0 + mins(3)).is_some());
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.elapsed(t0 + mins(3)), mins(3));
        assert_eq!(timer.next_deadline(), Some(t0 + mins(8)));
    }

    #[test]
    fn snapshot_reflects_state() {
        let t0 = Instant::now();
        let mut timer = timer();
        timer.start(TimerMode::Pomodoro, "math", t0);
        let snap = timer.snapshot(t0 + mins(5));
        assert_eq!(snap.state, TimerState::Running);
        assert_eq!(snap.phase, Phase::Work);
        assert_eq!(snap.remaining_secs, Some(20 * 60));
        assert_eq!(snap.elapsed_seconds, 300);
        assert_eq!(snap.subject, "math");
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let timer = FocusTimer::new(
            "learner-1",
            TimerSettings {
                work_minutes: 0,
                ..TimerSettings::default()
            },
            FixedOffset::east_opt(0).unwrap(),
        );
        assert_eq!(timer.settings(), &TimerSettings::default());
    }
}
