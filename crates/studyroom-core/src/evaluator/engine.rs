//! Trigger evaluation.
//!
//! Each poll tick the evaluator derives [`Signals`], asks the catalog which
//! rules apply, keeps the ones whose trigger fires and whose frequency class
//! still has room, then draws one by weight. It only nominates; the delivery
//! policy makes the final call.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::selection::weighted_choice;
use super::signals::Signals;
use crate::activity::EventLog;
use crate::config::GlobalPolicy;
use crate::delivery::DeliveryPolicy;
use crate::tips::{LearnerContext, TipCatalog, TipRule};

/// Everything one tick looks at. All borrowed, nothing mutated.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub global: &'a GlobalPolicy,
    pub catalog: &'a TipCatalog,
    pub log: &'a EventLog,
    pub context: &'a LearnerContext,
    pub delivery: &'a DeliveryPolicy,
    /// A Work phase is running.
    pub focus_phase: bool,
    /// A previously shown tip is still on screen.
    pub tip_displayed: bool,
    pub now: DateTime<Utc>,
    pub utc_offset: FixedOffset,
    pub activity_gap: Duration,
}

/// Why a tick produced no candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    FocusPhase,
    TipDisplayed,
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Nomination<'a> {
    Candidate(&'a TipRule),
    Skipped(SkipReason),
}

impl<'a> Nomination<'a> {
    pub fn candidate(&self) -> Option<&'a TipRule> {
        match self {
            Nomination::Candidate(rule) => Some(*rule),
            Nomination::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    rng: Mcg128Xsl64,
}

impl TriggerEvaluator {
    /// Seeded evaluators are reproducible; `None` draws from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self { rng }
    }

    pub fn evaluate<'a>(&mut self, input: TickInput<'a>) -> Nomination<'a> {
        if !input.global.enabled {
            return Nomination::Skipped(SkipReason::Disabled);
        }
        if input.global.respect_focus_phase && input.focus_phase {
            return Nomination::Skipped(SkipReason::FocusPhase);
        }
        if input.tip_displayed {
            return Nomination::Skipped(SkipReason::TipDisplayed);
        }

        let signals = Signals::compute(input.log, input.context, input.now, input.activity_gap);
        let local_now = input.now.with_timezone(&input.utc_offset);

        let candidates: Vec<&TipRule> = input
            .catalog
            .eligible_rules(local_now, input.context, input.global.adapt_to_performance)
            .into_iter()
            .filter(|rule| signals.satisfies(rule))
            .filter(|rule| {
                input
                    .delivery
                    .frequency_allows(&rule.id, rule.frequency, input.now)
            })
            .collect();

        debug!(
            learner_id = %input.log.learner_id(),
            candidates = candidates.len(),
            time_spent = signals.time_spent_minutes,
            inactivity = signals.inactivity_minutes,
            "evaluated triggers"
        );

        match weighted_choice(candidates, input.catalog, &mut self.rng) {
            Some(rule) => Nomination::Candidate(rule),
            None => Nomination::Skipped(SkipReason::NoCandidates),
        }
    }
}
