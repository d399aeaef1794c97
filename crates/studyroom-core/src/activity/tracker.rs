use chrono::{DateTime, Utc};
use tracing::debug;

use super::event::{InteractionEvent, InteractionKind};

/// Measures time spent on one target at a time.
///
/// Starting an activity produces a `view` event; ending it produces a second
/// `view` for the same target carrying the measured duration.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    learner_id: String,
    current: Option<(String, DateTime<Utc>)>,
}

impl ActivityTracker {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            current: None,
        }
    }

    /// Target of the open activity, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|(target, _)| target.as_str())
    }

    /// Open an activity on `target`. An activity already open is replaced
    /// without a closing event.
    pub fn start(&mut self, target: impl Into<String>, at: DateTime<Utc>) -> InteractionEvent {
        let target = target.into();
        if let Some((previous, _)) = self.current.take() {
            debug!(learner_id = %self.learner_id, %previous, "replacing open activity");
        }
        self.current = Some((target.clone(), at));
        InteractionEvent::new(self.learner_id.clone(), InteractionKind::View, target, at)
    }

    /// Close the open activity. `None` when nothing was open.
    pub fn end(&mut self, at: DateTime<Utc>) -> Option<InteractionEvent> {
        let (target, started) = self.current.take()?;
        let millis = u64::try_from((at - started).num_milliseconds()).unwrap_or(0);
        Some(
            InteractionEvent::new(self.learner_id.clone(), InteractionKind::View, target, at)
                .with_duration(millis),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn end_reports_duration_for_started_target() {
        let mut tracker = ActivityTracker::new("s1");
        let opened = tracker.start("reading-2", base());
        assert_eq!(opened.kind, InteractionKind::View);
        assert_eq!(opened.duration_millis, None);
        assert_eq!(tracker.current(), Some("reading-2"));

        let closed = tracker.end(base() + Duration::seconds(90)).unwrap();
        assert_eq!(closed.kind, InteractionKind::View);
        assert_eq!(closed.target, "reading-2");
        assert_eq!(closed.duration_millis, Some(90_000));
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn end_without_start_is_none() {
        let mut tracker = ActivityTracker::new("s1");
        assert!(tracker.end(base()).is_none());
    }

    #[test]
    fn restart_replaces_open_activity() {
        let mut tracker = ActivityTracker::new("s1");
        tracker.start("a", base());
        tracker.start("b", base() + Duration::seconds(10));

        let closed = tracker.end(base() + Duration::seconds(40)).unwrap();
        assert_eq!(closed.target, "b");
        assert_eq!(closed.duration_millis, Some(30_000));
    }

    #[test]
    fn clock_going_backwards_gives_zero_duration() {
        let mut tracker = ActivityTracker::new("s1");
        tracker.start("a", base());
        let closed = tracker.end(base() - Duration::seconds(5)).unwrap();
        assert_eq!(closed.duration_millis, Some(0));
    }
}
