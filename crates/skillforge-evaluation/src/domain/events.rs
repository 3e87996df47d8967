//! Domain events for the Evaluation context.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when an evaluation is requested for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCreated {
    /// The evaluation identifier.
    pub evaluation_id: String,
    /// The evaluated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The evaluated challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
}

/// Emitted when scoring finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCompleted {
    /// The evaluation identifier.
    pub evaluation_id: String,
    /// The evaluated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The evaluated challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
    /// Overall score in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Whether the submission met the pass threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

impl EventPayload for EvaluationCreated {
    const EVENT_TYPE: EventType = EventType::EvaluationCreated;
}

impl EventPayload for EvaluationCompleted {
    const EVENT_TYPE: EventType = EventType::EvaluationCompleted;
}
