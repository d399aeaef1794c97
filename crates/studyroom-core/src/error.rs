//! Core error types for studyroom-core.
//!
//! Decisions made by the engine (show/suppress, timer transitions) are total
//! and never surface here. These errors cover the edges: loading and
//! validating configuration, talking to a learner session that has shut down,
//! and the persistence collaborator rejecting a write.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Learner session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Persistence collaborator errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
///
/// `InvalidRule` is the "configuration invalid" case: the offending rule is
/// dropped from the active set, the engine keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A tip rule failed validation
    #[error("Invalid tip rule '{rule_id}': {message}")]
    InvalidRule { rule_id: String, message: String },

    /// Invalid timer duration
    #[error("Invalid duration for {what}: {message}")]
    InvalidDuration { what: String, message: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors talking to a learner session actor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session loop has shut down and no longer accepts commands
    #[error("Learner session '{learner_id}' is closed")]
    Closed { learner_id: String },
}

/// Errors raised by a `ReportSink` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The external store rejected a write
    #[error("Failed to write {kind}: {message}")]
    WriteFailed { kind: String, message: String },
}

impl ValidationError {
    pub(crate) fn rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidRule {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
