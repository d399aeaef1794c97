use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::activity::InteractionEvent;
use crate::delivery::{DeliveryStats, Outcome, SuppressionReason};
use crate::error::SessionError;
use crate::evaluator::SkipReason;
use crate::events::Event;
use crate::tips::{LearnerContext, TipCategory, TipRule};
use crate::timer::{StopRequest, StudySession, TimerMode, TimerSnapshot};

/// The tip currently on the learner's screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTip {
    pub tip_id: String,
    pub title: String,
    pub content: String,
    pub category: TipCategory,
    pub shown_at: DateTime<Utc>,
}

impl ActiveTip {
    pub(crate) fn from_rule(rule: &TipRule, shown_at: DateTime<Utc>) -> Self {
        Self {
            tip_id: rule.id.clone(),
            title: rule.title.clone(),
            content: rule.content.clone(),
            category: rule.category,
            shown_at,
        }
    }
}

/// Result of one evaluation tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Shown(ActiveTip),
    Suppressed {
        tip_id: String,
        reason: SuppressionReason,
    },
    Skipped(SkipReason),
}

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub(crate) enum Command {
    RecordInteraction(InteractionEvent),
    StartActivity {
        target: String,
        at: DateTime<Utc>,
    },
    EndActivity {
        at: DateTime<Utc>,
    },
    UpdateContext(LearnerContext),
    StartTimer {
        mode: TimerMode,
        subject: String,
        reply: Reply<TimerSnapshot>,
    },
    PauseTimer {
        reply: Reply<TimerSnapshot>,
    },
    ResumeTimer {
        reply: Reply<TimerSnapshot>,
    },
    SkipPhase {
        reply: Reply<TimerSnapshot>,
    },
    StopTimer {
        request: StopRequest,
        reply: Reply<Option<StudySession>>,
    },
    ResetTimer {
        reply: Reply<TimerSnapshot>,
    },
    RecordOutcome {
        tip_id: String,
        outcome: Outcome,
        reply: Reply<()>,
    },
    EvaluateNow {
        reply: Reply<TickOutcome>,
    },
    Stats {
        reply: Reply<DeliveryStats>,
    },
}

/// Cloneable front end to a learner session.
///
/// Every method fails with [`SessionError::Closed`] once the session has
/// shut down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    learner_id: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    current_tip: watch::Receiver<Option<ActiveTip>>,
    timer: watch::Receiver<TimerSnapshot>,
    events: broadcast::Sender<Event>,
}

impl SessionHandle {
    pub(crate) fn new(
        learner_id: Arc<str>,
        commands: mpsc::UnboundedSender<Command>,
        current_tip: watch::Receiver<Option<ActiveTip>>,
        timer: watch::Receiver<TimerSnapshot>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            learner_id,
            commands,
            current_tip,
            timer,
            events,
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    // ── Presentation reads ───────────────────────────────────────────

    pub fn current_tip(&self) -> watch::Receiver<Option<ActiveTip>> {
        self.current_tip.clone()
    }

    pub fn timer(&self) -> watch::Receiver<TimerSnapshot> {
        self.timer.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Inputs ───────────────────────────────────────────────────────

    pub fn record_interaction(&self, event: InteractionEvent) -> Result<(), SessionError> {
        self.send(Command::RecordInteraction(event))
    }

    /// Begin timing the learner's time on `target`.
    pub fn start_activity(&self, target: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::StartActivity {
            target: target.into(),
            at: Utc::now(),
        })
    }

    /// Close the open activity, recording how long it lasted.
    pub fn end_activity(&self) -> Result<(), SessionError> {
        self.send(Command::EndActivity { at: Utc::now() })
    }

    pub fn update_context(&self, context: LearnerContext) -> Result<(), SessionError> {
        self.send(Command::UpdateContext(context))
    }

    pub async fn start_timer(
        &self,
        mode: TimerMode,
        subject: impl Into<String>,
    ) -> Result<TimerSnapshot, SessionError> {
        let subject = subject.into();
        self.request(|reply| Command::StartTimer {
            mode,
            subject,
            reply,
        })
        .await
    }

    pub async fn pause_timer(&self) -> Result<TimerSnapshot, SessionError> {
        self.request(|reply| Command::PauseTimer { reply }).await
    }

    pub async fn resume_timer(&self) -> Result<TimerSnapshot, SessionError> {
        self.request(|reply| Command::ResumeTimer { reply }).await
    }

    /// End the current phase now.
    pub async fn skip_phase(&self) -> Result<TimerSnapshot, SessionError> {
        self.request(|reply| Command::SkipPhase { reply }).await
    }

    /// Stop the timer; yields the study session when the run counted.
    pub async fn stop_timer(&self, request: StopRequest) -> Result<Option<StudySession>, SessionError> {
        self.request(|reply| Command::StopTimer { request, reply }).await
    }

    pub async fn reset_timer(&self) -> Result<TimerSnapshot, SessionError> {
        self.request(|reply| Command::ResetTimer { reply }).await
    }

    pub async fn record_outcome(
        &self,
        tip_id: impl Into<String>,
        outcome: Outcome,
    ) -> Result<(), SessionError> {
        let tip_id = tip_id.into();
        self.request(|reply| Command::RecordOutcome {
            tip_id,
            outcome,
            reply,
        })
        .await
    }

    /// Run an evaluation tick immediately instead of waiting for the poll.
    pub async fn evaluate_now(&self) -> Result<TickOutcome, SessionError> {
        self.request(|reply| Command::EvaluateNow { reply }).await
    }

    pub async fn stats(&self) -> Result<DeliveryStats, SessionError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| self.closed())
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed {
            learner_id: self.learner_id.to_string(),
        }
    }
}
