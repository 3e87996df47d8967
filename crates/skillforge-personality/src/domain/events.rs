//! Domain events for the Personality context.
//!
//! Profiles are owned by exactly one user and keyed by the user id.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when a user's trait scores change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityProfileUpdated {
    pub user_id: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Emitted when new insights are generated from a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityInsightsGenerated {
    pub user_id: String,
    #[serde(default)]
    pub insight_count: u32,
}

impl EventPayload for PersonalityProfileUpdated {
    const EVENT_TYPE: EventType = EventType::PersonalityProfileUpdated;
}

impl EventPayload for PersonalityInsightsGenerated {
    const EVENT_TYPE: EventType = EventType::PersonalityInsightsGenerated;
}
