//! Domain events for the Challenge context.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when a challenge is generated or authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCreated {
    pub challenge_id: String,
    /// Owner, for user-scoped challenges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeUpdated {
    pub challenge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDeleted {
    pub challenge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Emitted when a user hands in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSubmitted {
    pub challenge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

/// Emitted when a submission has been accepted as complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCompleted {
    pub challenge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl EventPayload for ChallengeCreated {
    const EVENT_TYPE: EventType = EventType::ChallengeCreated;
}

impl EventPayload for ChallengeUpdated {
    const EVENT_TYPE: EventType = EventType::ChallengeUpdated;
}

impl EventPayload for ChallengeDeleted {
    const EVENT_TYPE: EventType = EventType::ChallengeDeleted;
}

impl EventPayload for ChallengeSubmitted {
    const EVENT_TYPE: EventType = EventType::ChallengeSubmitted;
}

impl EventPayload for ChallengeCompleted {
    const EVENT_TYPE: EventType = EventType::ChallengeCompleted;
}
