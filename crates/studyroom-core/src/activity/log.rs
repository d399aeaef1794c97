use chrono::{DateTime, Duration, Utc};

use super::event::{InteractionEvent, InteractionKind};

/// Append-only, timestamp-ordered log of one learner's interactions.
///
/// Events are never mutated or removed; windowing is up to the caller.
#[derive(Debug, Clone)]
pub struct EventLog {
    learner_id: String,
    created_at: DateTime<Utc>,
    /// Sorted by timestamp ascending; equal timestamps keep insertion order.
    events: Vec<InteractionEvent>,
}

impl EventLog {
    pub fn new(learner_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.into(),
            created_at,
            events: Vec::new(),
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append an event.
    ///
    /// In-order appends are a plain push. A late event is placed after every
    /// event with a timestamp less than or equal to its own.
    pub fn append(&mut self, event: InteractionEvent) {
        match self.events.last() {
            Some(last) if event.timestamp < last.timestamp => {
                let at = self
                    .events
                    .partition_point(|e| e.timestamp <= event.timestamp);
                self.events.insert(at, event);
            }
            _ => self.events.push(event),
        }
    }

    /// Events with `timestamp >= since`, oldest first.
    ///
    /// The returned iterator is lazy and can be cloned to restart it.
    pub fn query(
        &self,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &InteractionEvent> + Clone + '_ {
        let start = self.events.partition_point(|e| e.timestamp < since);
        self.events[start..].iter()
    }

    /// Timestamp of the most recent event, or the log's creation time.
    pub fn last_activity_time(&self) -> DateTime<Utc> {
        self.events
            .last()
            .map(|e| e.timestamp)
            .unwrap_or(self.created_at)
    }

    /// Start of the current unbroken activity window.
    ///
    /// Walks back from the latest event while consecutive events are closer
    /// than `gap`. Returns `None` when the log is empty or the learner has
    /// been idle for at least `gap`.
    pub fn activity_window_start(&self, now: DateTime<Utc>, gap: Duration) -> Option<DateTime<Utc>> {
        let last = self.events.last()?;
        if now - last.timestamp >= gap {
            return None;
        }

        let mut start = last.timestamp;
        for event in self.events.iter().rev().skip(1) {
            if start - event.timestamp >= gap {
                break;
            }
            start = event.timestamp;
        }
        Some(start)
    }

    pub fn count_by_kind(&self, kind: InteractionKind, since: DateTime<Utc>) -> usize {
        self.query(since).filter(|e| e.kind == kind).count()
    }
}
