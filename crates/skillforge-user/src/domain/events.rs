//! Domain events for the User context.

use serde::{Deserialize, Serialize};
use skillforge_core::event::{EventPayload, EventType};

/// Emitted when an account is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// The user identifier.
    pub user_id: String,
    /// Login email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Emitted when profile fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdated {
    /// The user identifier.
    pub user_id: String,
    /// Names of the fields that changed.
    #[serde(default)]
    pub changed_fields: Vec<String>,
}

/// Emitted when an account is suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeactivated {
    /// The user identifier.
    pub user_id: String,
    /// Operator-supplied reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Emitted when an account and its owned data are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    /// The user identifier.
    pub user_id: String,
}

impl EventPayload for UserCreated {
    const EVENT_TYPE: EventType = EventType::UserCreated;
}

impl EventPayload for UserUpdated {
    const EVENT_TYPE: EventType = EventType::UserUpdated;
}

impl EventPayload for UserDeactivated {
    const EVENT_TYPE: EventType = EventType::UserDeactivated;
}

impl EventPayload for UserDeleted {
    const EVENT_TYPE: EventType = EventType::UserDeleted;
}
