//! Domain event abstractions.
//!
//! A [`DomainEvent`] is the immutable envelope every producer hands to the
//! event bus: a closed [`EventType`], a JSON object payload carrying the
//! identifier of the entity that changed, and [`EventMetadata`] used to trace
//! a causal chain across handlers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;

/// Closed vocabulary of event kinds shared by producers and subscribers.
///
/// The serialized names form a versioned contract: renaming a variant is a
/// breaking change for every registrar and for persisted dead-letter entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A user account was created.
    UserCreated,
    /// A user's profile fields changed.
    UserUpdated,
    /// A user account was deactivated.
    UserDeactivated,
    /// A user account was removed.
    UserDeleted,
    /// A challenge was generated or authored.
    ChallengeCreated,
    /// A challenge's content or state changed.
    ChallengeUpdated,
    /// A challenge was removed.
    ChallengeDeleted,
    /// A user submitted a response to a challenge.
    ChallengeSubmitted,
    /// A challenge reached its completed state.
    ChallengeCompleted,
    /// An evaluation record was created for a submission.
    EvaluationCreated,
    /// An evaluation finished scoring a submission.
    EvaluationCompleted,
    /// A user's personality profile changed.
    PersonalityProfileUpdated,
    /// Personality insights were generated for a user.
    PersonalityInsightsGenerated,
    /// A focus area was created for a user.
    FocusAreaCreated,
    /// A user selected a focus area.
    FocusAreaSelected,
    /// A batch of focus areas was generated for a user.
    FocusAreasGenerated,
    /// A user's progress read model changed.
    ProgressUpdated,
    /// A user unlocked an achievement.
    AchievementUnlocked,
}

impl EventType {
    /// Every recognised event type, in declaration order.
    pub const ALL: [EventType; 18] = [
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::UserDeactivated,
        EventType::UserDeleted,
        EventType::ChallengeCreated,
        EventType::ChallengeUpdated,
        EventType::ChallengeDeleted,
        EventType::ChallengeSubmitted,
        EventType::ChallengeCompleted,
        EventType::EvaluationCreated,
        EventType::EvaluationCompleted,
        EventType::PersonalityProfileUpdated,
        EventType::PersonalityInsightsGenerated,
        EventType::FocusAreaCreated,
        EventType::FocusAreaSelected,
        EventType::FocusAreasGenerated,
        EventType::ProgressUpdated,
        EventType::AchievementUnlocked,
    ];

    /// Returns the wire name of this event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::UserCreated => "USER_CREATED",
            EventType::UserUpdated => "USER_UPDATED",
            EventType::UserDeactivated => "USER_DEACTIVATED",
            EventType::UserDeleted => "USER_DELETED",
            EventType::ChallengeCreated => "CHALLENGE_CREATED",
            EventType::ChallengeUpdated => "CHALLENGE_UPDATED",
            EventType::ChallengeDeleted => "CHALLENGE_DELETED",
            EventType::ChallengeSubmitted => "CHALLENGE_SUBMITTED",
            EventType::ChallengeCompleted => "CHALLENGE_COMPLETED",
            EventType::EvaluationCreated => "EVALUATION_CREATED",
            EventType::EvaluationCompleted => "EVALUATION_COMPLETED",
            EventType::PersonalityProfileUpdated => "PERSONALITY_PROFILE_UPDATED",
            EventType::PersonalityInsightsGenerated => "PERSONALITY_INSIGHTS_GENERATED",
            EventType::FocusAreaCreated => "FOCUS_AREA_CREATED",
            EventType::FocusAreaSelected => "FOCUS_AREA_SELECTED",
            EventType::FocusAreasGenerated => "FOCUS_AREAS_GENERATED",
            EventType::ProgressUpdated => "PROGRESS_UPDATED",
            EventType::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
        }
    }

    /// Entity family this event type describes, used as the `<entityType>`
    /// segment of default correlation ids.
    #[must_use]
    pub fn entity_type(self) -> &'static str {
        match self {
            EventType::UserCreated
            | EventType::UserUpdated
            | EventType::UserDeactivated
            | EventType::UserDeleted => "user",
            EventType::ChallengeCreated
            | EventType::ChallengeUpdated
            | EventType::ChallengeDeleted
            | EventType::ChallengeSubmitted
            | EventType::ChallengeCompleted => "challenge",
            EventType::EvaluationCreated | EventType::EvaluationCompleted => "evaluation",
            EventType::PersonalityProfileUpdated | EventType::PersonalityInsightsGenerated => {
                "personality"
            }
            EventType::FocusAreaCreated
            | EventType::FocusAreaSelected
            | EventType::FocusAreasGenerated => "focusArea",
            EventType::ProgressUpdated | EventType::AchievementUnlocked => "progress",
        }
    }

    /// Payload key that must carry the entity identifier for this type.
    ///
    /// Personality, focus-area and progress read models are keyed by the
    /// owning user.
    #[must_use]
    pub fn entity_id_key(self) -> &'static str {
        match self.entity_type() {
            "challenge" => "challengeId",
            "evaluation" => "evaluationId",
            _ => "userId",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("event type must not be empty"));
        }
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::invalid_argument(format!("unknown event type: {trimmed}")))
    }
}

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Timestamp of event creation.
    pub timestamp: DateTime<Utc>,
    /// Correlation id threading together events of one causal chain.
    pub correlation_id: String,
}

/// Immutable record that something of interest happened in the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: Uuid,
    #[serde(rename = "type")]
    event_type: EventType,
    data: Value,
    metadata: EventMetadata,
}

impl DomainEvent {
    /// Builds an event stamped with the clock's current time and a default
    /// correlation id of the form `<entityType>-<entityId>-<timestampMillis>`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `data` is not a JSON object
    /// or carries no entity identifier for `event_type`.
    pub fn new(event_type: EventType, data: Value, clock: &dyn Clock) -> Result<Self, DomainError> {
        let timestamp = clock.now();
        let mut event = Self {
            id: Uuid::new_v4(),
            event_type,
            data,
            metadata: EventMetadata {
                timestamp,
                correlation_id: String::new(),
            },
        };
        event.validate()?;
        event.metadata.correlation_id = format!(
            "{}-{}-{}",
            event.entity_type(),
            event.entity_id().unwrap_or_else(|| "unknown".to_owned()),
            timestamp.timestamp_millis()
        );
        Ok(event)
    }

    /// Builds an event with producer-supplied metadata.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `data` is not a JSON object
    /// or carries no entity identifier for `event_type`.
    pub fn with_metadata(
        event_type: EventType,
        data: Value,
        metadata: EventMetadata,
    ) -> Result<Self, DomainError> {
        let event = Self {
            id: Uuid::new_v4(),
            event_type,
            data,
            metadata,
        };
        event.validate()?;
        Ok(event)
    }

    /// Builds an event from a typed payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the payload does not
    /// serialize to an object carrying the entity identifier.
    pub fn from_payload<P: EventPayload>(payload: &P, clock: &dyn Clock) -> Result<Self, DomainError> {
        let data = serde_json::to_value(payload)
            .map_err(|e| DomainError::invalid_argument(format!("payload serialization failed: {e}")))?;
        Self::new(P::EVENT_TYPE, data, clock)
    }

    /// Replaces the correlation id, continuing an existing causal chain.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = correlation_id.into();
        self
    }

    /// Unique event identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The event kind.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The event payload (always a JSON object).
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Correlation id shorthand.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    /// Reads a payload field as a string. Numbers are rendered in decimal.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Entity family, preferring an explicit `entityType` payload field.
    #[must_use]
    pub fn entity_type(&self) -> String {
        self.field("entityType")
            .unwrap_or_else(|| self.event_type.entity_type().to_owned())
    }

    /// Entity identifier, preferring an explicit `entityId` payload field.
    #[must_use]
    pub fn entity_id(&self) -> Option<String> {
        self.field("entityId")
            .or_else(|| self.field(self.event_type.entity_id_key()))
    }

    /// Deserializes the payload into a typed struct.
    ///
    /// The payload is read in its canonical shape: a generic `entityId`
    /// fills the type's identifier key when that key is absent, and numeric
    /// `*Id` fields are rendered as strings.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the payload does not match
    /// the target shape.
    pub fn payload<P: EventPayload + DeserializeOwned>(&self) -> Result<P, DomainError> {
        serde_json::from_value(self.canonical_data()).map_err(|e| {
            DomainError::invalid_argument(format!("{} payload is malformed: {e}", self.event_type))
        })
    }

    fn canonical_data(&self) -> Value {
        let Value::Object(fields) = &self.data else {
            return self.data.clone();
        };
        let mut fields: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| match value {
                Value::Number(n) if key.ends_with("Id") => (key.clone(), Value::String(n.to_string())),
                _ => (key.clone(), value.clone()),
            })
            .collect();
        let id_key = self.event_type.entity_id_key();
        if !fields.get(id_key).is_some_and(Value::is_string)
            && let Some(id) = self.field("entityId")
        {
            fields.insert(id_key.to_owned(), Value::String(id));
        }
        Value::Object(fields)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if !self.data.is_object() {
            return Err(DomainError::invalid_argument(format!(
                "{} data must be a JSON object",
                self.event_type
            )));
        }
        if self.entity_id().is_none() {
            return Err(DomainError::invalid_argument(format!(
                "{} data must contain `{}` or `entityId`",
                self.event_type,
                self.event_type.entity_id_key()
            )));
        }
        Ok(())
    }
}

/// Trait implemented by the typed payload structs each domain publishes.
pub trait EventPayload: Serialize + Send + Sync + fmt::Debug {
    /// The event type this payload is published under.
    const EVENT_TYPE: EventType;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    struct PinnedClock(DateTime<Utc>);

    impl Clock for PinnedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn pinned() -> PinnedClock {
        PinnedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_default_correlation_id_uses_explicit_entity_fields() {
        // Arrange
        let clock = pinned();

        // Act
        let event = DomainEvent::new(
            EventType::ChallengeCreated,
            json!({ "entityType": "challenge", "entityId": "abc" }),
            &clock,
        )
        .unwrap();

        // Assert
        let expected = format!("challenge-abc-{}", clock.0.timestamp_millis());
        assert_eq!(event.correlation_id(), expected);
        assert_eq!(event.metadata().timestamp, clock.0);
    }

    #[test]
    fn test_default_correlation_id_falls_back_to_type_family_and_id_key() {
        let clock = pinned();

        let event =
            DomainEvent::new(EventType::EvaluationCompleted, json!({ "evaluationId": "e1" }), &clock)
                .unwrap();

        assert!(event.correlation_id().starts_with("evaluation-e1-"));
    }

    #[test]
    fn test_new_rejects_payload_without_entity_identifier() {
        let result = DomainEvent::new(EventType::UserCreated, json!({ "email": "a@b.c" }), &pinned());

        match result.unwrap_err() {
            DomainError::InvalidArgument(msg) => assert!(msg.contains("userId")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_non_object_payload() {
        let result = DomainEvent::new(EventType::UserCreated, json!("u1"), &pinned());

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_numeric_identifiers_are_accepted() {
        let event = DomainEvent::new(EventType::UserUpdated, json!({ "userId": 42 }), &pinned()).unwrap();

        assert_eq!(event.entity_id().as_deref(), Some("42"));
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ChallengeTouched {
        challenge_id: String,
        user_id: Option<String>,
    }

    impl EventPayload for ChallengeTouched {
        const EVENT_TYPE: EventType = EventType::ChallengeUpdated;
    }

    #[test]
    fn test_payload_reads_generic_entity_id_into_identifier_key() {
        // Arrange
        let event = DomainEvent::new(
            EventType::ChallengeUpdated,
            json!({ "entityType": "challenge", "entityId": "abc" }),
            &pinned(),
        )
        .unwrap();

        // Act
        let payload: ChallengeTouched = event.payload().unwrap();

        // Assert
        assert_eq!(payload.challenge_id, "abc");
        assert_eq!(payload.user_id, None);
    }

    #[test]
    fn test_payload_renders_numeric_identifiers_as_strings() {
        let event = DomainEvent::new(
            EventType::ChallengeUpdated,
            json!({ "challengeId": 7, "userId": 42 }),
            &pinned(),
        )
        .unwrap();

        let payload: ChallengeTouched = event.payload().unwrap();

        assert_eq!(payload.challenge_id, "7");
        assert_eq!(payload.user_id.as_deref(), Some("42"));
        assert_eq!(event.data()["challengeId"], 7);
    }

    #[test]
    fn test_with_correlation_id_overrides_default() {
        let event = DomainEvent::new(EventType::UserUpdated, json!({ "userId": "u1" }), &pinned())
            .unwrap()
            .with_correlation_id("req-123");

        assert_eq!(event.correlation_id(), "req-123");
    }

    #[test]
    fn test_event_type_parses_wire_names() {
        assert_eq!("USER_CREATED".parse::<EventType>().unwrap(), EventType::UserCreated);
        assert_eq!(
            "focus_area_selected".parse::<EventType>().unwrap(),
            EventType::FocusAreaSelected
        );
    }

    #[test]
    fn test_event_type_rejects_empty_and_unknown_names() {
        assert!(matches!("".parse::<EventType>(), Err(DomainError::InvalidArgument(_))));
        assert!(matches!(
            "USER_EXPLODED".parse::<EventType>(),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_event_serializes_with_wire_field_names() {
        let event = DomainEvent::new(EventType::ProgressUpdated, json!({ "userId": "u1" }), &pinned())
            .unwrap();

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "PROGRESS_UPDATED");
        assert_eq!(value["data"]["userId"], "u1");
        assert!(value["metadata"]["correlationId"].is_string());
    }
}
