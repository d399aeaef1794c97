use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest single phase or custom countdown: one day.
pub const MAX_PHASE_MINUTES: u64 = 24 * 60;

/// How the focus timer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TimerMode {
    /// Work / short break / long break cycle.
    Pomodoro,
    /// A single countdown of user-chosen length.
    Custom { minutes: u64 },
    /// Free-running, never completes on its own.
    Stopwatch,
}

impl TimerMode {
    /// Build a custom countdown of 1 to [`MAX_PHASE_MINUTES`] minutes.
    pub fn custom(minutes: u64) -> Result<Self, ValidationError> {
        let mode = TimerMode::Custom { minutes };
        mode.validate()?;
        Ok(mode)
    }

    /// Rejects custom countdowns outside 1..=[`MAX_PHASE_MINUTES`] minutes.
    pub fn validate(self) -> Result<(), ValidationError> {
        match self {
            TimerMode::Custom { minutes: 0 } => Err(ValidationError::InvalidDuration {
                what: "custom timer".into(),
                message: "must be at least one minute".into(),
            }),
            TimerMode::Custom { minutes } if minutes > MAX_PHASE_MINUTES => {
                Err(ValidationError::InvalidDuration {
                    what: "custom timer".into(),
                    message: format!("must be at most {MAX_PHASE_MINUTES} minutes"),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn first_phase(self) -> Phase {
        match self {
            TimerMode::Pomodoro => Phase::Work,
            TimerMode::Custom { .. } | TimerMode::Stopwatch => Phase::Running,
        }
    }
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::Pomodoro
    }
}

/// Current phase of the focus timer.
///
/// Pomodoro mode cycles through `Work`, `ShortBreak` and `LongBreak`;
/// custom and stopwatch modes only know `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Work,
    ShortBreak,
    LongBreak,
    Running,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }
}

/// Pomodoro phase lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u64,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
}

fn default_work_minutes() -> u64 {
    25
}
fn default_short_break_minutes() -> u64 {
    5
}
fn default_long_break_minutes() -> u64 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            cycles_before_long_break: default_cycles_before_long_break(),
        }
    }
}

impl TimerSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("timer.work_minutes", self.work_minutes),
            ("timer.short_break_minutes", self.short_break_minutes),
            ("timer.long_break_minutes", self.long_break_minutes),
            ("timer.cycles_before_long_break", self.cycles_before_long_break as u64),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        let minutes = [
            ("timer.work_minutes", self.work_minutes),
            ("timer.short_break_minutes", self.short_break_minutes),
            ("timer.long_break_minutes", self.long_break_minutes),
        ];
        for (field, value) in minutes {
            if value > MAX_PHASE_MINUTES {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: format!("must be at most {MAX_PHASE_MINUTES}"),
                });
            }
        }
        Ok(())
    }

    /// Length of `phase` in `mode`. `None` means unbounded.
    pub fn duration_for(&self, mode: TimerMode, phase: Phase) -> Option<Duration> {
        let minutes = match (mode, phase) {
            (TimerMode::Pomodoro, Phase::Work) => self.work_minutes,
            (TimerMode::Pomodoro, Phase::ShortBreak) => self.short_break_minutes,
            (TimerMode::Pomodoro, Phase::LongBreak) => self.long_break_minutes,
            (TimerMode::Custom { minutes }, Phase::Running) => minutes,
            _ => return None,
        };
        Some(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Phase that follows a completed `Work` phase, given the cycle count
    /// before this completion.
    pub fn break_after_work(&self, completed_cycles: u32) -> Phase {
        let interval = self.cycles_before_long_break.max(1);
        if (completed_cycles + 1) % interval == 0 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pomodoro_durations() {
        let s = TimerSettings::default();
        let secs = |p| s.duration_for(TimerMode::Pomodoro, p).unwrap().as_secs();
        assert_eq!(secs(Phase::Work), 1500);
        assert_eq!(secs(Phase::ShortBreak), 300);
        assert_eq!(secs(Phase::LongBreak), 900);
    }

    #[test]
    fn stopwatch_is_unbounded() {
        let s = TimerSettings::default();
        assert_eq!(s.duration_for(TimerMode::Stopwatch, Phase::Running), None);
    }

    #[test]
    fn custom_uses_supplied_minutes() {
        let s = TimerSettings::default();
        let mode = TimerMode::custom(40).unwrap();
        assert_eq!(
            s.duration_for(mode, Phase::Running),
            Some(Duration::from_secs(2400))
        );
        assert!(TimerMode::custom(0).is_err());
    }

    #[test]
    fn custom_longer_than_a_day_is_rejected() {
        assert!(TimerMode::custom(MAX_PHASE_MINUTES).is_ok());
        assert!(TimerMode::custom(MAX_PHASE_MINUTES + 1).is_err());
        assert!(TimerMode::Custom { minutes: u64::MAX / 60 }.validate().is_err());

        let s = TimerSettings {
            work_minutes: MAX_PHASE_MINUTES + 1,
            ..TimerSettings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn every_fourth_work_completion_earns_long_break() {
        let s = TimerSettings::default();
        let breaks: Vec<_> = (0..8).map(|c| s.break_after_work(c)).collect();
        assert_eq!(
            breaks,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak,
            ]
        );
    }

    #[test]
    fn zero_lengths_fail_validation() {
        let s = TimerSettings {
            short_break_minutes: 0,
            ..TimerSettings::default()
        };
        assert!(s.validate().is_err());
        assert!(TimerSettings::default().validate().is_ok());
    }

    #[test]
    fn timer_mode_toml_shape() {
        let toml = r#"
            mode = "custom"
            minutes = 50
        "#;
        let mode: TimerMode = toml::from_str(toml).unwrap();
        assert_eq!(mode, TimerMode::Custom { minutes: 50 });
    }
}
