//! Domain events for the Focus Area context.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when a focus area is added to a user's catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAreaCreated {
    /// Owning user.
    pub user_id: String,
    /// The new focus area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Emitted when a user makes a focus area active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAreaSelected {
    /// Owning user.
    pub user_id: String,
    /// The selected focus area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area_id: Option<String>,
}

/// Emitted when a batch of suggested focus areas is produced for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAreasGenerated {
    /// Owning user.
    pub user_id: String,
    /// Identifiers of the generated focus areas.
    #[serde(default)]
    pub focus_area_ids: Vec<String>,
}

impl EventPayload for FocusAreaCreated {
    const EVENT_TYPE: EventType = EventType::FocusAreaCreated;
}

impl EventPayload for FocusAreaSelected {
    const EVENT_TYPE: EventType = EventType::FocusAreaSelected;
}

impl EventPayload for FocusAreasGenerated {
    const EVENT_TYPE: EventType = EventType::FocusAreasGenerated;
}
