//! TOML-based tips configuration.
//!
//! Holds everything the instructor-facing settings can change:
//! - Global delivery policy (caps, cooldown, focus-phase respect)
//! - Engine tuning (poll cadence, activity gap, local offset, RNG seed)
//! - Pomodoro phase lengths
//! - Category switches and weights
//! - The tip rules themselves
//!
//! A loaded config is an immutable snapshot. Reloading builds a new one and
//! publishes it; nothing is edited in place.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ConfigError, Result, ValidationError};
use crate::tips::{
    default_categories, default_rules, CategorySetting, TipCatalog, TipCategory, TipRule,
};
use crate::timer::TimerSettings;

/// Process-wide delivery policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_tips_per_day")]
    pub max_tips_per_day: u32,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
    /// Never nominate a tip while a Work phase is running.
    #[serde(default = "default_true")]
    pub respect_focus_phase: bool,
    /// Apply grade/engagement conditions on rules.
    #[serde(default = "default_true")]
    pub adapt_to_performance: bool,
}

/// Evaluation loop tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Gap between interactions that ends a continuous activity window.
    #[serde(default = "default_activity_gap_minutes")]
    pub activity_gap_minutes: u32,
    /// Offset used for calendar days, time-of-day and day-of-week.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Fixed seed for tip selection; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Complete tips configuration.
///
/// Serialized to/from TOML; every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipsConfig {
    #[serde(default)]
    pub global: GlobalPolicy,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<TipCategory, CategorySetting>,
    #[serde(default = "default_rules")]
    pub rules: Vec<TipRule>,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_max_tips_per_day() -> u32 {
    5
}
fn default_cooldown_minutes() -> u32 {
    30
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_activity_gap_minutes() -> u32 {
    10
}

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tips_per_day: default_max_tips_per_day(),
            cooldown_minutes: default_cooldown_minutes(),
            respect_focus_phase: true,
            adapt_to_performance: true,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            activity_gap_minutes: default_activity_gap_minutes(),
            utc_offset_minutes: 0,
            seed: None,
        }
    }
}

impl Default for TipsConfig {
    fn default() -> Self {
        Self {
            global: GlobalPolicy::default(),
            engine: EngineSettings::default(),
            timer: TimerSettings::default(),
            categories: default_categories(),
            rules: default_rules(),
        }
    }
}

impl EngineSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn activity_gap(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.activity_gap_minutes.max(1)))
    }

    /// Local offset; out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

impl TipsConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has the wrong
    /// shape. Individually malformed rules are not errors; they are dropped
    /// when the catalog is built.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: TipsConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.check_engine()?;
        Ok(cfg)
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be represented as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()).into())
    }

    /// Validate rules and categories into a catalog.
    pub fn catalog(&self) -> (TipCatalog, Vec<ValidationError>) {
        TipCatalog::build(self.rules.clone(), self.categories.clone())
    }

    fn check_engine(&self) -> Result<(), ConfigError> {
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.poll_interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if FixedOffset::east_opt(self.engine.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "engine.utc_offset_minutes".into(),
                message: format!("{} is not a valid offset", self.engine.utc_offset_minutes),
            });
        }
        if let Err(e) = self.timer.validate() {
            warn!(error = %e, "timer settings invalid, defaults will be used");
        }
        Ok(())
    }
}

/// Publishes immutable config snapshots to every learner session.
///
/// A reload replaces the whole snapshot; sessions pick it up before their
/// next tick.
#[derive(Debug)]
pub struct ConfigPublisher {
    tx: watch::Sender<Arc<TipsConfig>>,
}

impl ConfigPublisher {
    pub fn new(initial: TipsConfig) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TipsConfig>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Arc<TipsConfig> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn publish(&self, config: TipsConfig) {
        info!(rules = config.rules.len(), "publishing tips config");
        self.tx.send_replace(Arc::new(config));
    }

    /// Load a file and publish it. On error the current snapshot stays.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<()> {
        let config = TipsConfig::load_from(path)?;
        self.publish(config);
        Ok(())
    }
}

impl Default for ConfigPublisher {
    fn default() -> Self {
        Self::new(TipsConfig::default())
    }
}
