//! Learner sessions: one actor task per learner.
//!
//! [`LearnerSession::spawn`] starts the event loop and its outbox and returns
//! the owning handle. Cloneable [`SessionHandle`]s talk to the loop; the
//! presentation layer reads the current tip and the timer through `watch`
//! receivers without ever blocking the loop.

mod actor;
mod handle;
mod outbox;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub use handle::{ActiveTip, SessionHandle, TickOutcome};
pub use outbox::{NullSink, Outbound, ReportSink, RetryPolicy};

use crate::config::TipsConfig;
use crate::delivery::{DeliveryPolicy, DeliveryRecord};
use crate::timer::TimerSnapshot;
use actor::{ActorParts, SessionActor};

const EVENT_CAPACITY: usize = 64;

/// Everything needed to start a learner session.
pub struct SessionOptions {
    pub learner_id: String,
    pub config: watch::Receiver<Arc<TipsConfig>>,
    pub sink: Arc<dyn ReportSink>,
    pub retry: RetryPolicy,
    /// Previously persisted delivery ledger, so limits survive restarts.
    pub history: Vec<DeliveryRecord>,
}

impl SessionOptions {
    pub fn new(learner_id: impl Into<String>, config: watch::Receiver<Arc<TipsConfig>>) -> Self {
        Self {
            learner_id: learner_id.into(),
            config,
            sink: Arc::new(NullSink),
            retry: RetryPolicy::default(),
            history: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history(mut self, history: Vec<DeliveryRecord>) -> Self {
        self.history = history;
        self
    }
}

/// Owner of a running learner session.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) cancels the loop
/// but does not wait for the outbox to drain.
pub struct LearnerSession {
    handle: SessionHandle,
    cancel: CancellationToken,
    actor: Option<JoinHandle<()>>,
    outbox: Option<JoinHandle<()>>,
}

impl LearnerSession {
    /// Spawn a session with no persistence. Must be called inside a tokio runtime.
    pub fn spawn(learner_id: impl Into<String>, config: watch::Receiver<Arc<TipsConfig>>) -> Self {
        Self::spawn_with(SessionOptions::new(learner_id, config))
    }

    pub fn spawn_with(options: SessionOptions) -> Self {
        let SessionOptions {
            learner_id,
            mut config,
            sink,
            retry,
            history,
        } = options;

        let snapshot = Arc::clone(&config.borrow_and_update());
        let delivery =
            DeliveryPolicy::with_history(learner_id.clone(), snapshot.engine.utc_offset(), history);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let (tip_tx, tip_rx) = watch::channel(None);
        let (timer_tx, timer_rx) = watch::channel(TimerSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = SessionActor::new(ActorParts {
            learner_id: learner_id.clone(),
            config: snapshot,
            delivery,
            current_tip: tip_tx,
            timer_tx,
            events: events_tx.clone(),
            outbox: outbox_tx,
        });

        let handle = SessionHandle::new(
            Arc::from(learner_id.as_str()),
            command_tx,
            tip_rx,
            timer_rx,
            events_tx,
        );

        let cancel = CancellationToken::new();
        let outbox = outbox::spawn_outbox(learner_id, sink, retry, outbox_rx);
        let actor = tokio::spawn(actor.run(command_rx, config, cancel.clone()));

        Self {
            handle,
            cancel,
            actor: Some(actor),
            outbox: Some(outbox),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn learner_id(&self) -> &str {
        self.handle.learner_id()
    }

    /// Stop the loop, then wait for queued reports to be written.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let learner_id = self.handle.learner_id().to_string();
        for task in [self.actor.take(), self.outbox.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                error!(learner_id = %learner_id, error = %e, "learner session task failed");
            }
        }
    }
}

impl Drop for LearnerSession {
    fn drop(&mut self) {
        if self.actor.is_some() {
            warn!(
                learner_id = %self.handle.learner_id(),
                "learner session dropped while running; cancelling"
            );
            self.cancel.cancel();
        }
    }
}

impl std::ops::Deref for LearnerSession {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}
