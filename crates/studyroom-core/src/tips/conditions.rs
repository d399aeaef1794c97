//! Optional per-rule conditions evaluated against the learner context.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use super::context::LearnerContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TipConditions {
    #[serde(default)]
    pub min_grade: Option<f64>,
    #[serde(default)]
    pub max_grade: Option<f64>,
    #[serde(default)]
    pub min_engagement: Option<f64>,
    #[serde(default)]
    pub max_engagement: Option<f64>,
    /// Dayparts (`morning`, `afternoon`, `evening`, `night`) or
    /// `HH:MM-HH:MM` ranges. Empty means any time.
    #[serde(default)]
    pub time_of_day: Vec<String>,
    /// 0 = Sunday .. 6 = Saturday. Empty means any day.
    #[serde(default)]
    pub days_of_week: Vec<u8>,
}

/// Half-open local time range `[start, end)`, possibly wrapping midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(text: &str) -> Option<Self> {
        let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        let window = match text.trim().to_ascii_lowercase().as_str() {
            "morning" => Self { start: hm(5, 0)?, end: hm(12, 0)? },
            "afternoon" => Self { start: hm(12, 0)?, end: hm(18, 0)? },
            "evening" => Self { start: hm(18, 0)?, end: hm(22, 0)? },
            "night" => Self { start: hm(22, 0)?, end: hm(5, 0)? },
            other => {
                let (start, end) = other.split_once('-')?;
                Self {
                    start: NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?,
                    end: NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?,
                }
            }
        };
        Some(window)
    }

    /// `HH:MM-HH:MM` with equal ends covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

impl TipConditions {
    pub(crate) fn validate(&self) -> Result<(), String> {
        let ranges = [
            ("grade", self.min_grade, self.max_grade),
            ("engagement", self.min_engagement, self.max_engagement),
        ];
        for (name, min, max) in ranges {
            for (side, bound) in [("min", min), ("max", max)] {
                if let Some(b) = bound.filter(|b| !b.is_finite()) {
                    return Err(format!("{side}_{name} must be a finite number, got {b}"));
                }
            }
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(format!("min_{name} ({min}) is greater than max_{name} ({max})"));
                }
            }
        }
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(format!("days_of_week entry {day} is outside 0-6"));
        }
        for text in &self.time_of_day {
            match TimeWindow::parse(text) {
                None => return Err(format!("unrecognised time_of_day '{text}'")),
                Some(window) if window.is_empty() => {
                    return Err(format!("time_of_day '{text}' starts and ends at the same time"));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Whether the conditions hold for `ctx` at local time `now`.
    ///
    /// Grade and engagement bounds only apply when `adapt_to_performance`
    /// is set; a bound on a signal the context does not carry fails.
    pub fn matches(
        &self,
        ctx: &LearnerContext,
        now: DateTime<FixedOffset>,
        adapt_to_performance: bool,
    ) -> bool {
        if adapt_to_performance
            && !(within(ctx.current_grade, self.min_grade, self.max_grade)
                && within(ctx.engagement_percent, self.min_engagement, self.max_engagement))
        {
            return false;
        }

        if !self.days_of_week.is_empty() {
            let today = now.weekday().num_days_from_sunday() as u8;
            if !self.days_of_week.contains(&today) {
                return false;
            }
        }

        if !self.time_of_day.is_empty() {
            let time = now.time();
            let any = self
                .time_of_day
                .iter()
                .filter_map(|s| TimeWindow::parse(s))
                .any(|w| w.contains(time));
            if !any {
                return false;
            }
        }

        true
    }
}

fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
}
