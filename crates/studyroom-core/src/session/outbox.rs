//! Fire-and-forget persistence for a learner session.
//!
//! The actor pushes [`Outbound`] items onto an unbounded channel and moves
//! on. A separate task drains the channel and hands each item to the
//! [`ReportSink`] on the blocking pool, retrying with exponential backoff.
//! A write that still fails is logged and dropped; in-memory state stays
//! authoritative.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::delivery::DeliveryRecord;
use crate::error::PersistenceError;
use crate::timer::StudySession;

/// External store for study sessions and the delivery ledger.
///
/// Implementations may block; they are always called from the blocking
/// pool. Both methods default to no-ops.
pub trait ReportSink: Send + Sync + 'static {
    fn write_session(&self, _session: &StudySession) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn write_delivery(&self, _record: &DeliveryRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {}

/// Exponential backoff for sink writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Item queued for the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Session(StudySession),
    Delivery(DeliveryRecord),
}

impl Outbound {
    fn kind(&self) -> &'static str {
        match self {
            Outbound::Session(_) => "study_session",
            Outbound::Delivery(_) => "delivery_record",
        }
    }

    fn write_to(&self, sink: &dyn ReportSink) -> Result<(), PersistenceError> {
        match self {
            Outbound::Session(session) => sink.write_session(session),
            Outbound::Delivery(record) => sink.write_delivery(record),
        }
    }
}

/// Spawn the outbox task. It exits once every sender is dropped and the
/// queue is drained.
pub(crate) fn spawn_outbox(
    learner_id: String,
    sink: Arc<dyn ReportSink>,
    retry: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            deliver(&learner_id, &sink, &retry, item).await;
        }
        debug!(learner_id = %learner_id, "outbox drained");
    })
}

async fn deliver(learner_id: &str, sink: &Arc<dyn ReportSink>, retry: &RetryPolicy, item: Outbound) {
    let kind = item.kind();
    let item = Arc::new(item);
    let attempts = retry.max_attempts.max(1);

    for attempt in 1..=attempts {
        let sink = Arc::clone(sink);
        let payload = Arc::clone(&item);
        let result = tokio::task::spawn_blocking(move || payload.write_to(sink.as_ref())).await;

        match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) if attempt < attempts => {
                let delay = retry.delay_after(attempt);
                warn!(
                    learner_id = %learner_id,
                    kind,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "report write failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Ok(Err(e)) => {
                error!(learner_id = %learner_id, kind, attempts, error = %e, "report write failed, giving up");
                return;
            }
            Err(join_err) => {
                error!(learner_id = %learner_id, kind, error = %join_err, "report writer panicked");
                return;
            }
        }
    }
}
