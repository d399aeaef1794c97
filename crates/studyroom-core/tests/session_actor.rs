//! Integration tests for the learner session actor.
//!
//! Runs on tokio's paused clock: sleeping in the test advances the actor's
//! timers instantly and deterministically.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use studyroom_core::{
    ConfigPublisher, DeliveryRecord, Event, Frequency, InteractionEvent, InteractionKind,
    LearnerSession, Outcome, Phase, PersistenceError, Priority, ReportSink, RetryPolicy,
    SessionError, SessionOptions, SkipReason, StopRequest, StudySession, TickOutcome, TimerMode,
    TimerState, TipAction, TipCategory, TipRule, TipsConfig, TriggerKind, MAX_PHASE_MINUTES,
};
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Default)]
struct MemorySink {
    sessions: Mutex<Vec<StudySession>>,
    deliveries: Mutex<Vec<DeliveryRecord>>,
}

impl ReportSink for MemorySink {
    fn write_session(&self, session: &StudySession) -> Result<(), PersistenceError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    fn write_delivery(&self, record: &DeliveryRecord) -> Result<(), PersistenceError> {
        self.deliveries.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Rejects every write and counts the attempts.
#[derive(Default)]
struct FailingSink {
    attempts: AtomicU32,
}

impl ReportSink for FailingSink {
    fn write_session(&self, _session: &StudySession) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::WriteFailed {
            kind: "study_session".into(),
            message: "store offline".into(),
        })
    }

    fn write_delivery(&self, _record: &DeliveryRecord) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::WriteFailed {
            kind: "delivery_record".into(),
            message: "store offline".into(),
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A single custom tip that fires on every tick, with polling pushed far out
/// so only explicit evaluations run.
fn manual_config() -> TipsConfig {
    let mut config = TipsConfig::default();
    config.engine.poll_interval_secs = 3600;
    config.engine.seed = Some(5);
    config.global.cooldown_minutes = 0;
    config.rules = vec![TipRule {
        id: "stretch".into(),
        title: "Stretch".into(),
        content: "Stand up and stretch for a minute.".into(),
        category: TipCategory::Focus,
        trigger: TriggerKind::Custom,
        trigger_value: 0.0,
        priority: Priority::Medium,
        frequency: Frequency::Always,
        is_active: true,
        conditions: None,
    }];
    config
}

fn spawn(publisher: &ConfigPublisher, sink: Arc<MemorySink>) -> LearnerSession {
    LearnerSession::spawn_with(SessionOptions::new("learner-1", publisher.subscribe()).with_sink(sink))
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_phase_completion_fires_on_deadline() {
    init_tracing();
    let publisher = ConfigPublisher::default();
    let session = spawn(&publisher, Arc::new(MemorySink::default()));
    let mut events = session.subscribe();

    let snapshot = session.start_timer(TimerMode::Pomodoro, "Chemistry").await.unwrap();
    assert_eq!(snapshot.phase, Phase::Work);
    assert_eq!(snapshot.remaining_secs, Some(25 * 60));

    tokio::time::sleep(Duration::from_secs(25 * 60 + 1)).await;

    let completed: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::PhaseCompleted { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![(Phase::Work, Phase::ShortBreak)]);

    let timer = session.timer();
    let snapshot = timer.borrow().clone();
    assert_eq!(snapshot.phase, Phase::ShortBreak);
    assert_eq!(snapshot.completed_cycles, 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_pending_completion() {
    let publisher = ConfigPublisher::default();
    let session = spawn(&publisher, Arc::new(MemorySink::default()));
    let mut events = session.subscribe();

    session.start_timer(TimerMode::custom(5).unwrap(), "Latin").await.unwrap();
    let snapshot = session.reset_timer().await.unwrap();
    assert_eq!(snapshot.state, TimerState::Idle);

    tokio::time::sleep(Duration::from_secs(600)).await;
    let completions = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, Event::PhaseCompleted { .. }))
        .count();
    assert_eq!(completions, 0);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_sends_study_session_to_sink() {
    let publisher = ConfigPublisher::default();
    let sink = Arc::new(MemorySink::default());
    let session = spawn(&publisher, sink.clone());

    session.start_timer(TimerMode::custom(30).unwrap(), "Algebra").await.unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;
    session.pause_timer().await.unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    session.resume_timer().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let recorded = session
        .stop_timer(StopRequest {
            focus_rating: Some(8),
            notes: "quadratics".into(),
        })
        .await
        .unwrap()
        .expect("run long enough to count");
    assert_eq!(recorded.elapsed_seconds, 120);
    assert_eq!(recorded.duration_minutes, 2);
    assert_eq!(recorded.focus_score, Some(80));
    assert_eq!(recorded.subject, "Algebra");

    session.shutdown().await;
    let written = sink.sessions.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].id, recorded.id);
}

#[tokio::test(start_paused = true)]
async fn test_short_run_is_not_recorded() {
    let publisher = ConfigPublisher::default();
    let sink = Arc::new(MemorySink::default());
    let session = spawn(&publisher, sink.clone());

    session.start_timer(TimerMode::Stopwatch, "Art").await.unwrap();
    tokio::time::sleep(Duration::from_secs(59)).await;
    let recorded = session.stop_timer(StopRequest::default()).await.unwrap();
    assert!(recorded.is_none());

    session.shutdown().await;
    assert!(sink.sessions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tip_lifecycle_and_ledger_reporting() {
    let publisher = ConfigPublisher::new(manual_config());
    let sink = Arc::new(MemorySink::default());
    let session = spawn(&publisher, sink.clone());
    let current = session.current_tip();

    let shown = match session.evaluate_now().await.unwrap() {
        TickOutcome::Shown(tip) => tip,
        other => panic!("expected a tip, got {other:?}"),
    };
    assert_eq!(shown.tip_id, "stretch");
    assert_eq!(current.borrow().as_ref().map(|t| t.tip_id.clone()), Some("stretch".into()));

    // Still on screen: nothing new is nominated.
    assert_eq!(
        session.evaluate_now().await.unwrap(),
        TickOutcome::Skipped(SkipReason::TipDisplayed)
    );

    session.record_outcome("stretch", Outcome::Applied).await.unwrap();
    assert!(current.borrow().is_none());

    assert!(matches!(session.evaluate_now().await.unwrap(), TickOutcome::Shown(_)));

    let stats = session.stats().await.unwrap();
    assert_eq!(stats.shown_today, 2);
    assert_eq!(stats.applied, 1);

    session.shutdown().await;
    let actions: Vec<TipAction> = sink
        .deliveries
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(actions, vec![TipAction::Shown, TipAction::Applied, TipAction::Shown]);
}

#[tokio::test(start_paused = true)]
async fn test_focus_phase_suppresses_nomination() {
    let publisher = ConfigPublisher::new(manual_config());
    let session = spawn(&publisher, Arc::new(MemorySink::default()));

    session.start_timer(TimerMode::Pomodoro, "Geography").await.unwrap();
    assert_eq!(
        session.evaluate_now().await.unwrap(),
        TickOutcome::Skipped(SkipReason::FocusPhase)
    );

    session.pause_timer().await.unwrap();
    assert!(matches!(session.evaluate_now().await.unwrap(), TickOutcome::Shown(_)));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_config_reload_applies_before_next_command() {
    let publisher = ConfigPublisher::new(manual_config());
    let session = spawn(&publisher, Arc::new(MemorySink::default()));
    let mut events = session.subscribe();

    let mut disabled = manual_config();
    disabled.global.enabled = false;
    publisher.publish(disabled);

    assert_eq!(
        session.evaluate_now().await.unwrap(),
        TickOutcome::Skipped(SkipReason::Disabled)
    );
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, Event::ConfigReloaded { active_rules: 1, .. })));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_tick_shows_tip_for_idle_learner() {
    let mut config = manual_config();
    config.engine.poll_interval_secs = 30;
    let publisher = ConfigPublisher::new(config);
    let session = spawn(&publisher, Arc::new(MemorySink::default()));
    let mut current = session.current_tip();

    session
        .record_interaction(InteractionEvent::new(
            "learner-1",
            InteractionKind::View,
            "course-home",
            chrono::Utc::now(),
        ))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(60), current.changed())
        .await
        .expect("poll tick within a minute")
        .unwrap();
    assert!(current.borrow().is_some());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_fail_after_shutdown() {
    let publisher = ConfigPublisher::default();
    let session = spawn(&publisher, Arc::new(MemorySink::default()));
    let handle = session.handle();

    session.shutdown().await;

    assert_eq!(
        handle.evaluate_now().await.unwrap_err(),
        SessionError::Closed {
            learner_id: "learner-1".into()
        }
    );
    assert!(handle.update_context(Default::default()).is_err());
    assert!(handle.start_activity("reading-1").is_err());
    assert!(handle.end_activity().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_backed_off_sink_does_not_delay_phase_completion() {
    init_tracing();
    let mut config = manual_config();
    config.global.respect_focus_phase = false;
    let publisher = ConfigPublisher::new(config);
    let sink = Arc::new(FailingSink::default());
    let session = LearnerSession::spawn_with(
        SessionOptions::new("learner-1", publisher.subscribe())
            .with_sink(sink.clone())
            .with_retry(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(30 * 60),
            }),
    );
    let mut events = session.subscribe();

    let started = Instant::now();
    session.start_timer(TimerMode::Pomodoro, "Chemistry").await.unwrap();
    // The shown record goes to the outbox, which fails and backs off for 30 minutes.
    assert!(matches!(session.evaluate_now().await.unwrap(), TickOutcome::Shown(_)));

    loop {
        match events.recv().await.unwrap() {
            Event::PhaseCompleted { from, to, .. } => {
                assert_eq!((from, to), (Phase::Work, Phase::ShortBreak));
                break;
            }
            _ => continue,
        }
    }
    let fired_after = Instant::now() - started;
    assert!(fired_after >= Duration::from_secs(25 * 60));
    assert!(fired_after < Duration::from_secs(25 * 60 + 1));
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);

    session.shutdown().await;
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_custom_timer_leaves_session_usable() {
    let publisher = ConfigPublisher::default();
    let session = spawn(&publisher, Arc::new(MemorySink::default()));

    let snapshot = session
        .start_timer(TimerMode::Custom { minutes: u64::MAX / 60 }, "Latin")
        .await
        .unwrap();
    assert_eq!(snapshot.state, TimerState::Idle);

    let snapshot = session
        .start_timer(TimerMode::custom(MAX_PHASE_MINUTES).unwrap(), "Latin")
        .await
        .unwrap();
    assert_eq!(snapshot.state, TimerState::Running);
    assert_eq!(snapshot.remaining_secs, Some(MAX_PHASE_MINUTES * 60));

    session.shutdown().await;
}
