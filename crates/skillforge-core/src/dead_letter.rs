//! Dead-letter records and the store abstraction behind them.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{DomainEvent, EventType};

/// Default page size for dead-letter queries.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Lifecycle of a dead-letter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadLetterStatus {
    /// Awaiting retry or operator action.
    Pending,
    /// A retry is in flight.
    Retrying,
    /// Retried successfully or resolved by an operator.
    Resolved,
    /// Retries exhausted.
    FailedPermanently,
}

impl DeadLetterStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [DeadLetterStatus; 4] = [
        DeadLetterStatus::Pending,
        DeadLetterStatus::Retrying,
        DeadLetterStatus::Resolved,
        DeadLetterStatus::FailedPermanently,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeadLetterStatus::Pending => "PENDING",
            DeadLetterStatus::Retrying => "RETRYING",
            DeadLetterStatus::Resolved => "RESOLVED",
            DeadLetterStatus::FailedPermanently => "FAILED_PERMANENTLY",
        }
    }
}

impl fmt::Display for DeadLetterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeadLetterStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeadLetterStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::invalid_argument(format!("unknown dead letter status: {s}")))
    }
}

/// Durable record of one failed (event, handler) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Type of the failed event.
    pub event_type: EventType,
    /// Full snapshot of the failed event; retries replay it verbatim.
    pub event: DomainEvent,
    /// Name of the subscription that failed.
    pub handler_name: String,
    /// Correlation id copied from the event for querying.
    pub correlation_id: String,
    /// Most recent failure message.
    pub error_message: String,
    /// When the original failure happened.
    pub failed_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: DeadLetterStatus,
    /// Failed retry attempts so far.
    pub retry_count: u32,
    /// When the last retry finished.
    pub last_retry_at: Option<DateTime<Utc>>,
    /// When the entry reached `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DeadLetterEntry {
    /// Creates a `Pending` entry for a failed handler invocation.
    #[must_use]
    pub fn new(
        event: &DomainEvent,
        handler_name: impl Into<String>,
        error_message: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event.event_type(),
            event: event.clone(),
            handler_name: handler_name.into(),
            correlation_id: event.correlation_id().to_owned(),
            error_message: error_message.into(),
            failed_at,
            status: DeadLetterStatus::Pending,
            retry_count: 0,
            last_retry_at: None,
            resolved_at: None,
        }
    }
}

/// Filter and pagination for dead-letter queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterQuery {
    /// Only entries in this status.
    pub status: Option<DeadLetterStatus>,
    /// Only entries for this event type.
    pub event_type: Option<EventType>,
    /// Maximum number of entries returned.
    pub limit: usize,
    /// Number of matching entries skipped (most recent first).
    pub offset: usize,
}

impl Default for DeadLetterQuery {
    fn default() -> Self {
        Self {
            status: None,
            event_type: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl DeadLetterQuery {
    /// Query for every entry in `status`.
    #[must_use]
    pub fn with_status(status: DeadLetterStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns true if `entry` passes the status and event type filters.
    #[must_use]
    pub fn matches(&self, entry: &DeadLetterEntry) -> bool {
        self.status.is_none_or(|s| s == entry.status)
            && self.event_type.is_none_or(|t| t == entry.event_type)
    }
}

/// Persistence port for dead-letter entries.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Persist a new entry.
    async fn insert(&self, entry: &DeadLetterEntry) -> Result<(), DomainError>;

    /// Load one entry.
    async fn get(&self, id: Uuid) -> Result<Option<DeadLetterEntry>, DomainError>;

    /// Matching entries ordered by `failed_at` descending, paginated.
    async fn list(&self, query: &DeadLetterQuery) -> Result<Vec<DeadLetterEntry>, DomainError>;

    /// Overwrite an existing entry. Returns false if it no longer exists.
    async fn update(&self, entry: &DeadLetterEntry) -> Result<bool, DomainError>;

    /// Remove an entry. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Number of entries per status. Statuses with no entries may be omitted.
    async fn count_by_status(&self) -> Result<Vec<(DeadLetterStatus, u64)>, DomainError>;
}
