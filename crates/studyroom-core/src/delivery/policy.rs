//! Per-learner rate limiting for tips.
//!
//! The policy owns the learner's delivery ledger and is the only thing that
//! reads or writes it. Given a nominated rule it decides Show or Suppressed:
//!
//! 1. Global switch off: `GlobalDisabled`
//! 2. Tips shown today (local calendar day) at or above the cap: `DailyCapReached`
//! 3. Last shown tip, of any kind, inside the cooldown: `Cooldown`
//! 4. The rule's frequency class is used up: `FrequencyExhausted`

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use super::record::{Decision, DeliveryRecord, Outcome, SuppressionReason, TipAction};
use super::stats::DeliveryStats;
use crate::config::GlobalPolicy;
use crate::tips::{Frequency, TipRule};

/// Span covered by the `weekly` frequency class. Records older than this are
/// irrelevant to every check once their ids are remembered.
pub const FREQUENCY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    learner_id: String,
    utc_offset: FixedOffset,
    records: Vec<DeliveryRecord>,
    /// `records[..flushed]` have been handed to the outbox.
    flushed: usize,
    /// Every tip id ever shown, kept across compaction for `once` rules.
    ever_shown: HashSet<String>,
    last_shown_at: Option<DateTime<Utc>>,
    shown_total: u64,
    dismissed_total: u64,
    applied_total: u64,
}

impl DeliveryPolicy {
    pub fn new(learner_id: impl Into<String>, utc_offset: FixedOffset) -> Self {
        Self {
            learner_id: learner_id.into(),
            utc_offset,
            records: Vec::new(),
            flushed: 0,
            ever_shown: HashSet::new(),
            last_shown_at: None,
            shown_total: 0,
            dismissed_total: 0,
            applied_total: 0,
        }
    }

    /// Rebuild a policy from a previously persisted ledger.
    ///
    /// Restored records count as already flushed.
    pub fn with_history(
        learner_id: impl Into<String>,
        utc_offset: FixedOffset,
        history: impl IntoIterator<Item = DeliveryRecord>,
    ) -> Self {
        let mut policy = Self::new(learner_id, utc_offset);
        for record in history {
            policy.push(record);
        }
        policy.flushed = policy.records.len();
        policy
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    pub fn set_utc_offset(&mut self, utc_offset: FixedOffset) {
        self.utc_offset = utc_offset;
    }

    /// Decide whether `rule` may be shown at `now` without recording anything.
    ///
    /// Calling this any number of times gives the same answer until the
    /// ledger changes.
    pub fn check(&self, global: &GlobalPolicy, rule: &TipRule, now: DateTime<Utc>) -> Decision {
        if !global.enabled {
            return Decision::Suppressed(SuppressionReason::GlobalDisabled);
        }
        if self.shown_on(self.local_date(now)) >= u64::from(global.max_tips_per_day) {
            return Decision::Suppressed(SuppressionReason::DailyCapReached);
        }
        if let Some(last) = self.last_shown_at {
            let cooldown = Duration::minutes(i64::from(global.cooldown_minutes));
            if now - last < cooldown {
                return Decision::Suppressed(SuppressionReason::Cooldown);
            }
        }
        if !self.frequency_allows(&rule.id, rule.frequency, now) {
            return Decision::Suppressed(SuppressionReason::FrequencyExhausted);
        }
        Decision::Show
    }

    /// [`check`](Self::check), appending a `shown` record when the answer is Show.
    pub fn consider(&mut self, global: &GlobalPolicy, rule: &TipRule, now: DateTime<Utc>) -> Decision {
        let decision = self.check(global, rule, now);
        match decision {
            Decision::Show => {
                self.push(DeliveryRecord {
                    tip_id: rule.id.clone(),
                    learner_id: self.learner_id.clone(),
                    shown_at: now,
                    action: TipAction::Shown,
                });
            }
            Decision::Suppressed(reason) => {
                debug!(learner_id = %self.learner_id, tip_id = %rule.id, %reason, "tip suppressed");
            }
        }
        decision
    }

    /// Whether the rule's own frequency class permits showing it at `now`.
    pub fn frequency_allows(&self, tip_id: &str, frequency: Frequency, now: DateTime<Utc>) -> bool {
        match frequency {
            Frequency::Always => true,
            Frequency::Once => !self.ever_shown.contains(tip_id),
            Frequency::Daily => {
                let today = self.local_date(now);
                !self
                    .shown_records()
                    .any(|r| r.tip_id == tip_id && self.local_date(r.shown_at) == today)
            }
            Frequency::Weekly => {
                let window = Duration::days(FREQUENCY_WINDOW_DAYS);
                !self
                    .shown_records()
                    .any(|r| r.tip_id == tip_id && now - r.shown_at < window)
            }
        }
    }

    /// Append the learner's response to a shown tip.
    ///
    /// Earlier decisions are untouched; an outcome for a tip that was never
    /// shown is still recorded.
    pub fn record_outcome(&mut self, tip_id: &str, outcome: Outcome, now: DateTime<Utc>) -> DeliveryRecord {
        let record = DeliveryRecord {
            tip_id: tip_id.to_string(),
            learner_id: self.learner_id.clone(),
            shown_at: now,
            action: outcome.into(),
        };
        self.push(record.clone());
        record
    }

    /// Records appended since the previous call, oldest first.
    pub fn take_unflushed(&mut self) -> Vec<DeliveryRecord> {
        let fresh = self.records[self.flushed..].to_vec();
        self.flushed = self.records.len();
        fresh
    }

    /// Drop flushed records that no check can see any more.
    ///
    /// Keeps everything inside the weekly window and everything not yet
    /// flushed. Returns the number of records removed.
    pub fn compact(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(FREQUENCY_WINDOW_DAYS);
        let mut pending = self.records.split_off(self.flushed);
        let before = self.records.len();
        self.records.retain(|r| r.shown_at >= cutoff);
        let removed = before - self.records.len();
        self.flushed = self.records.len();
        self.records.append(&mut pending);
        if removed > 0 {
            debug!(learner_id = %self.learner_id, removed, "compacted delivery ledger");
        }
        removed
    }

    pub fn stats(&self, now: DateTime<Utc>) -> DeliveryStats {
        DeliveryStats {
            shown_today: self.shown_on(self.local_date(now)),
            shown_total: self.shown_total,
            dismissed: self.dismissed_total,
            applied: self.applied_total,
            last_shown_at: self.last_shown_at,
        }
    }

    fn push(&mut self, record: DeliveryRecord) {
        match record.action {
            TipAction::Shown => {
                self.shown_total += 1;
                self.ever_shown.insert(record.tip_id.clone());
                if self.last_shown_at.map_or(true, |last| record.shown_at > last) {
                    self.last_shown_at = Some(record.shown_at);
                }
            }
            TipAction::Dismissed => self.dismissed_total += 1,
            TipAction::Applied => self.applied_total += 1,
        }
        self.records.push(record);
    }

    fn shown_records(&self) -> impl Iterator<Item = &DeliveryRecord> + '_ {
        self.records.iter().filter(|r| r.action == TipAction::Shown)
    }

    fn shown_on(&self, day: NaiveDate) -> u64 {
        self.shown_records()
            .filter(|r| self.local_date(r.shown_at) == day)
            .count() as u64
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }
}
