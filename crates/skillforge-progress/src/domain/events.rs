//! Domain events for the Progress context.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when a user's aggregate progress is recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdated {
    /// The user identifier.
    pub user_id: String,
    /// Focus area the progress applies to, if scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area_id: Option<String>,
    /// New completion ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<f64>,
}

/// Emitted when a user earns an achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementUnlocked {
    /// The user identifier.
    pub user_id: String,
    /// The achievement identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_id: Option<String>,
}

impl EventPayload for ProgressUpdated {
    const EVENT_TYPE: EventType = EventType::ProgressUpdated;
}

impl EventPayload for AchievementUnlocked {
    const EVENT_TYPE: EventType = EventType::AchievementUnlocked;
}
