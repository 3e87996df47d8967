//! Bounded event history.
//!
//! Diagnostic only: a fixed-capacity ring buffer of recent publishes and the
//! outcome of each handler. The dead-letter queue, not this buffer, is the
//! actionable record of failures.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillforge_core::event::EventType;
use uuid::Uuid;

/// Outcome of one handler invocation within a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerOutcome {
    /// Handler name.
    pub handler: String,
    /// Whether the handler returned `Ok`.
    pub success: bool,
    /// Wall-clock time spent in the handler.
    pub duration_ms: u64,
    /// Failure message, if any.
    pub error: Option<String>,
    /// Dead-letter entry recorded for the failure, if recording succeeded.
    pub dead_letter_id: Option<Uuid>,
}

/// One publish as seen by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Published event id.
    pub event_id: Uuid,
    /// Published event type.
    pub event_type: EventType,
    /// Correlation id of the event.
    pub correlation_id: String,
    /// When the publish started.
    pub timestamp: DateTime<Utc>,
    /// Per-handler outcomes in invocation order.
    pub handler_results: Vec<HandlerOutcome>,
}

/// Filter for history reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Only this event type.
    pub event_name: Option<EventType>,
    /// Only this correlation id.
    pub correlation_id: Option<String>,
    /// Maximum entries returned.
    pub limit: Option<usize>,
}

/// Upper bound on the slots reserved up front; the buffer grows past it on demand.
const PREALLOCATED_SLOTS: usize = 1_024;

/// Fixed-capacity ring buffer of publishes.
#[derive(Debug)]
pub struct EventHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl EventHistory {
    /// Create an empty history holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&self, entry: HistoryEntry) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Matching entries, most recent first.
    #[must_use]
    pub fn query(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        let limit = query.limit.unwrap_or(self.capacity);
        self.lock()
            .iter()
            .rev()
            .filter(|e| query.event_name.is_none_or(|t| t == e.event_type))
            .filter(|e| {
                query
                    .correlation_id
                    .as_deref()
                    .is_none_or(|c| c == e.correlation_id)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
