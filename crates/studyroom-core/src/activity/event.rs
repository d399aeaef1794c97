use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of tracked learner interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Click,
    Submit,
    Download,
    /// The learner responded to a tip popup.
    PopupViewed,
}

/// A single learner interaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    pub learner_id: String,
    pub kind: InteractionKind,
    /// Opaque identifier of the UI object (e.g. `assignment-42`).
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_millis: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl InteractionEvent {
    pub fn new(
        learner_id: impl Into<String>,
        kind: InteractionKind,
        target: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.into(),
            kind,
            target: target.into(),
            timestamp,
            duration_millis: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach the time spent on the target, as reported when an activity ends.
    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration_millis = Some(millis);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
