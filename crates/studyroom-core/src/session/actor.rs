//! The per-learner event loop.
//!
//! One task exclusively owns the learner's event log, focus timer, delivery
//! ledger and evaluator. Everything else talks to it through commands, so
//! evaluation ticks, timer completions and learner actions are serialized
//! without locks.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{ActiveTip, Command, TickOutcome};
use super::outbox::Outbound;
use crate::activity::{ActivityTracker, EventLog, InteractionEvent, InteractionKind};
use crate::config::TipsConfig;
use crate::delivery::{Decision, DeliveryPolicy, Outcome, TipAction};
use crate::evaluator::{Nomination, TickInput, TriggerEvaluator};
use crate::events::Event;
use crate::tips::{LearnerContext, TipCatalog};
use crate::timer::{FocusTimer, StopRequest, StudySession, TimerSnapshot};

pub(crate) struct SessionActor {
    learner_id: String,
    config: Arc<TipsConfig>,
    catalog: TipCatalog,
    log: EventLog,
    activity: ActivityTracker,
    timer: FocusTimer,
    delivery: DeliveryPolicy,
    evaluator: TriggerEvaluator,
    context: LearnerContext,
    current_tip: watch::Sender<Option<ActiveTip>>,
    timer_tx: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<Event>,
    outbox: mpsc::UnboundedSender<Outbound>,
}

pub(crate) struct ActorParts {
    pub learner_id: String,
    pub config: Arc<TipsConfig>,
    pub delivery: DeliveryPolicy,
    pub current_tip: watch::Sender<Option<ActiveTip>>,
    pub timer_tx: watch::Sender<TimerSnapshot>,
    pub events: broadcast::Sender<Event>,
    pub outbox: mpsc::UnboundedSender<Outbound>,
}

impl SessionActor {
    pub(crate) fn new(parts: ActorParts) -> Self {
        let ActorParts {
            learner_id,
            config,
            delivery,
            current_tip,
            timer_tx,
            events,
            outbox,
        } = parts;
        let offset = config.engine.utc_offset();
        let (catalog, _) = config.catalog();
        Self {
            log: EventLog::new(learner_id.clone(), Utc::now()),
            activity: ActivityTracker::new(learner_id.clone()),
            timer: FocusTimer::new(learner_id.clone(), config.timer.clone(), offset),
            evaluator: TriggerEvaluator::new(config.engine.seed),
            learner_id,
            catalog,
            delivery,
            context: LearnerContext::default(),
            current_tip,
            timer_tx,
            events,
            outbox,
            config,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut config_rx: watch::Receiver<Arc<TipsConfig>>,
        cancel: CancellationToken,
    ) {
        let mut poll = poll_interval(&self.config);
        let mut config_open = true;
        info!(learner_id = %self.learner_id, "learner session started");

        loop {
            let deadline = self.timer.next_deadline();
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                changed = config_rx.changed(), if config_open => match changed {
                    Ok(()) => {
                        let config = Arc::clone(&config_rx.borrow_and_update());
                        if config.engine.poll_interval() != self.config.engine.poll_interval() {
                            poll = poll_interval(&config);
                        }
                        self.apply_config(config);
                    }
                    Err(_) => {
                        debug!(learner_id = %self.learner_id, "config publisher dropped");
                        config_open = false;
                    }
                },

                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },

                _ = sleep_until(deadline) => self.drain_timer(Instant::now()),

                _ = poll.tick() => {
                    self.drain_timer(Instant::now());
                    self.evaluate();
                    self.publish_timer();
                }
            }
        }

        info!(learner_id = %self.learner_id, "learner session stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        self.drain_timer(now);

        match command {
            Command::RecordInteraction(event) => self.record_interaction(event),
            Command::StartActivity { target, at } => {
                let event = self.activity.start(target, at);
                self.log.append(event);
            }
            Command::EndActivity { at } => {
                if let Some(event) = self.activity.end(at) {
                    self.log.append(event);
                }
            }
            Command::UpdateContext(context) => self.context = context,
            Command::StartTimer {
                mode,
                subject,
                reply,
            } => {
                if let Some(event) = self.timer.start(mode, subject, now) {
                    self.emit(event);
                }
                let _ = reply.send(self.publish_timer());
            }
            Command::PauseTimer { reply } => {
                if let Some(event) = self.timer.pause(now) {
                    self.emit(event);
                }
                self.drain_timer(now);
                let _ = reply.send(self.publish_timer());
            }
            Command::ResumeTimer { reply } => {
                if let Some(event) = self.timer.resume(now) {
                    self.emit(event);
                }
                let _ = reply.send(self.publish_timer());
            }
            Command::SkipPhase { reply } => {
                if let Some(event) = self.timer.complete_phase(now) {
                    self.emit(event);
                }
                self.drain_timer(now);
                let _ = reply.send(self.publish_timer());
            }
            Command::StopTimer { request, reply } => {
                let session = self.stop_timer(now, request);
                self.publish_timer();
                let _ = reply.send(session);
            }
            Command::ResetTimer { reply } => {
                if let Some(event) = self.timer.reset() {
                    self.emit(event);
                }
                let _ = reply.send(self.publish_timer());
            }
            Command::RecordOutcome {
                tip_id,
                outcome,
                reply,
            } => {
                self.record_outcome(&tip_id, outcome);
                let _ = reply.send(());
            }
            Command::EvaluateNow { reply } => {
                let outcome = self.evaluate();
                let _ = reply.send(outcome);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.delivery.stats(Utc::now()));
            }
        }
    }

    fn record_interaction(&mut self, event: InteractionEvent) {
        if event.learner_id != self.learner_id {
            warn!(
                learner_id = %self.learner_id,
                other = %event.learner_id,
                "dropping interaction for another learner"
            );
            return;
        }
        self.log.append(event);
    }

    fn stop_timer(&mut self, now: Instant, request: StopRequest) -> Option<StudySession> {
        let event = self.timer.stop(now, request)?;
        let session = match &event {
            Event::TimerStopped { session, .. } => session.clone(),
            _ => None,
        };
        if let Some(session) = &session {
            info!(
                learner_id = %self.learner_id,
                subject = %session.subject,
                minutes = session.duration_minutes,
                "study session recorded"
            );
            self.queue(Outbound::Session(session.clone()));
        }
        self.emit(event);
        session
    }

    fn record_outcome(&mut self, tip_id: &str, outcome: Outcome) {
        let now = Utc::now();
        let record = self.delivery.record_outcome(tip_id, outcome, now);

        let displayed = self
            .current_tip
            .borrow()
            .as_ref()
            .map_or(false, |tip| tip.tip_id == tip_id);
        if displayed {
            self.current_tip.send_replace(None);
        }

        let action = TipAction::from(outcome);
        self.log.append(
            InteractionEvent::new(self.learner_id.clone(), InteractionKind::PopupViewed, tip_id, now)
                .with_metadata("action", serde_json::json!(action)),
        );
        debug!(learner_id = %self.learner_id, tip_id, ?action, "tip outcome recorded");
        self.emit(Event::TipOutcome {
            tip_id: record.tip_id,
            action,
            at: now,
        });
        self.flush_ledger();
    }

    /// One evaluation tick: nominate, then let the delivery policy decide.
    fn evaluate(&mut self) -> TickOutcome {
        let now = Utc::now();
        let config = Arc::clone(&self.config);
        let tip_displayed = self.current_tip.borrow().is_some();

        let nomination = self.evaluator.evaluate(TickInput {
            global: &config.global,
            catalog: &self.catalog,
            log: &self.log,
            context: &self.context,
            delivery: &self.delivery,
            focus_phase: self.timer.is_working(),
            tip_displayed,
            now,
            utc_offset: config.engine.utc_offset(),
            activity_gap: config.engine.activity_gap(),
        });
        let rule = match nomination {
            Nomination::Candidate(rule) => rule.clone(),
            Nomination::Skipped(reason) => {
                debug!(learner_id = %self.learner_id, ?reason, "no tip this tick");
                return TickOutcome::Skipped(reason);
            }
        };

        match self.delivery.consider(&config.global, &rule, now) {
            Decision::Show => {
                let tip = ActiveTip::from_rule(&rule, now);
                info!(learner_id = %self.learner_id, tip_id = %rule.id, "showing tip");
                self.current_tip.send_replace(Some(tip.clone()));
                self.emit(Event::TipShown {
                    tip_id: rule.id.clone(),
                    title: rule.title.clone(),
                    category: rule.category,
                    at: now,
                });
                self.flush_ledger();
                TickOutcome::Shown(tip)
            }
            Decision::Suppressed(reason) => {
                self.emit(Event::TipSuppressed {
                    tip_id: rule.id.clone(),
                    reason,
                    at: now,
                });
                TickOutcome::Suppressed {
                    tip_id: rule.id,
                    reason,
                }
            }
        }
    }

    fn apply_config(&mut self, config: Arc<TipsConfig>) {
        let (catalog, rejected) = config.catalog();
        if !rejected.is_empty() {
            warn!(
                learner_id = %self.learner_id,
                rejected = rejected.len(),
                "reloaded config has invalid rules"
            );
        }
        let offset = config.engine.utc_offset();
        self.timer.set_settings(config.timer.clone());
        self.timer.set_utc_offset(offset);
        self.delivery.set_utc_offset(offset);
        if config.engine.seed != self.config.engine.seed {
            self.evaluator = TriggerEvaluator::new(config.engine.seed);
        }
        self.catalog = catalog;
        self.config = config;

        info!(
            learner_id = %self.learner_id,
            active_rules = self.catalog.active_count(),
            "config reloaded"
        );
        self.emit(Event::ConfigReloaded {
            active_rules: self.catalog.active_count(),
            at: Utc::now(),
        });
    }

    fn drain_timer(&mut self, now: Instant) {
        let events = self.timer.tick(now);
        if events.is_empty() {
            return;
        }
        for event in events {
            self.emit(event);
        }
        self.publish_timer();
    }

    fn publish_timer(&self) -> TimerSnapshot {
        let snapshot = self.timer.snapshot(Instant::now());
        self.timer_tx.send_replace(snapshot.clone());
        snapshot
    }

    fn flush_ledger(&mut self) {
        for record in self.delivery.take_unflushed() {
            self.queue(Outbound::Delivery(record));
        }
        self.delivery.compact(Utc::now());
    }

    fn queue(&self, item: Outbound) {
        if self.outbox.send(item).is_err() {
            warn!(learner_id = %self.learner_id, "outbox closed, dropping report");
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn poll_interval(config: &TipsConfig) -> Interval {
    let period = config.engine.poll_interval();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
