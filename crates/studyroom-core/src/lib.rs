//! # Studyroom Core Library
//!
//! Core logic for the Studyroom self-regulation assistant: a focus timer for
//! study sessions and an adaptive tip engine that watches learner activity
//! and shows short, rate-limited tips.
//!
//! The UI and the assignment/grading side stay outside this crate. They push
//! interaction events and learner context in, and read the current tip, the
//! timer snapshot and the event stream out.
//!
//! ## Architecture
//!
//! - **Event Log**: append-only, time-ordered interaction history per learner
//! - **Focus Timer**: Pomodoro / custom / stopwatch state machine driven by
//!   monotonic instants
//! - **Tip Catalog**: validated rules, category weights and conditions
//! - **Trigger Evaluator**: derives signals each poll tick and nominates one
//!   tip by weighted choice
//! - **Delivery Policy**: daily cap, cooldown and frequency classes over an
//!   append-only ledger
//! - **Learner Session**: tokio actor that owns all of the above for one
//!   learner and reports sessions and deliveries through a [`ReportSink`]
//!
//! ## Key Components
//!
//! - [`LearnerSession`]: spawn, drive and shut down a learner's actor
//! - [`FocusTimer`]: timer state machine
//! - [`DeliveryPolicy`]: show/suppress decisions
//! - [`TipsConfig`]: TOML configuration, published via [`ConfigPublisher`]

pub mod activity;
pub mod config;
pub mod delivery;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod session;
pub mod timer;
pub mod tips;

pub use activity::{ActivityTracker, EventLog, InteractionEvent, InteractionKind};
pub use config::{ConfigPublisher, EngineSettings, GlobalPolicy, TipsConfig};
pub use delivery::{
    Decision, DeliveryPolicy, DeliveryRecord, DeliveryStats, Outcome, SuppressionReason, TipAction,
};
pub use error::{ConfigError, CoreError, PersistenceError, Result, SessionError, ValidationError};
pub use evaluator::{Nomination, Signals, SkipReason, TickInput, TriggerEvaluator};
pub use events::Event;
pub use session::{
    ActiveTip, LearnerSession, NullSink, ReportSink, RetryPolicy, SessionHandle, SessionOptions,
    TickOutcome,
};
pub use timer::{
    FocusTimer, Phase, StopRequest, StudySession, TimerMode, TimerSettings, TimerSnapshot,
    TimerState, MAX_PHASE_MINUTES,
};
pub use tips::{
    CategorySetting, Frequency, LearnerContext, Priority, TipCatalog, TipCategory, TipConditions,
    TipRule, TriggerKind,
};
