//! Publish and handler counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillforge_core::event::EventType;

#[derive(Debug, Default, Clone, Copy)]
struct TypeCounters {
    published: u64,
    handled: u64,
    failed: u64,
    timed_out: u64,
    handler_micros: u64,
}

#[derive(Debug, Default)]
struct MetricsState {
    per_type: HashMap<EventType, TypeCounters>,
    retries_succeeded: u64,
    retries_failed: u64,
    dlq_write_failures: u64,
}

/// Counters for a single event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeMetrics {
    /// Publishes of this type.
    pub published: u64,
    /// Handler invocations that succeeded.
    pub handled: u64,
    /// Handler invocations that failed, timeouts included.
    pub failed: u64,
    /// Handler invocations cut off by the timeout.
    pub timed_out: u64,
    /// Mean handler latency in milliseconds.
    pub avg_handler_latency_ms: f64,
}

/// Serializable view of the bus counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_published: u64,
    pub total_handled: u64,
    pub total_failed: u64,
    pub retries_succeeded: u64,
    pub retries_failed: u64,
    pub dlq_write_failures: u64,
    pub uptime_seconds: i64,
    pub event_types: BTreeMap<String, EventTypeMetrics>,
    pub subscriptions: BTreeMap<String, usize>,
}

/// Thread-safe counters updated by the bus on every publish.
#[derive(Debug)]
pub struct EventBusMetrics {
    state: Mutex<MetricsState>,
    started_at: DateTime<Utc>,
}

impl EventBusMetrics {
    /// Counters starting at zero, with uptime measured from `started_at`.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            started_at,
        }
    }

    pub fn record_published(&self, event_type: EventType) {
        self.lock().per_type.entry(event_type).or_default().published += 1;
    }

    /// Record one handler invocation.
    pub fn record_handler(&self, event_type: EventType, elapsed: Duration, success: bool, timed_out: bool) {
        let mut state = self.lock();
        let counters = state.per_type.entry(event_type).or_default();
        if success {
            counters.handled += 1;
        } else {
            counters.failed += 1;
        }
        if timed_out {
            counters.timed_out += 1;
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        counters.handler_micros = counters.handler_micros.saturating_add(micros);
    }

    pub fn record_retry(&self, success: bool) {
        let mut state = self.lock();
        if success {
            state.retries_succeeded += 1;
        } else {
            state.retries_failed += 1;
        }
    }

    pub fn record_dlq_write_failure(&self) {
        self.lock().dlq_write_failures += 1;
    }

    /// Copy the counters out. `subscriptions` is the current handler count
    /// per event type.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>, subscriptions: BTreeMap<String, usize>) -> MetricsSnapshot {
        let state = self.lock();
        let mut event_types = BTreeMap::new();
        let (mut total_published, mut total_handled, mut total_failed) = (0, 0, 0);

        for (event_type, c) in &state.per_type {
            total_published += c.published;
            total_handled += c.handled;
            total_failed += c.failed;
            event_types.insert(
                event_type.as_str().to_owned(),
                EventTypeMetrics {
                    published: c.published,
                    handled: c.handled,
                    failed: c.failed,
                    timed_out: c.timed_out,
                    avg_handler_latency_ms: average_ms(c.handler_micros, c.handled + c.failed),
                },
            );
        }

        MetricsSnapshot {
            total_published,
            total_handled,
            total_failed,
            retries_succeeded: state.retries_succeeded,
            retries_failed: state.retries_failed,
            dlq_write_failures: state.dlq_write_failures,
            uptime_seconds: (now - self.started_at).num_seconds().max(0),
            event_types,
            subscriptions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[allow(clippy::cast_precision_loss)]
fn average_ms(total_micros: u64, invocations: u64) -> f64 {
    if invocations == 0 {
        return 0.0;
    }
    total_micros as f64 / invocations as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use skillforge_test_support::fixed_time;

    use super::*;

    #[test]
    fn test_snapshot_aggregates_per_type_counters() {
        // Arrange
        let metrics = EventBusMetrics::new(fixed_time());
        metrics.record_published(EventType::UserCreated);
        metrics.record_published(EventType::UserCreated);
        metrics.record_handler(EventType::UserCreated, Duration::from_millis(4), true, false);
        metrics.record_handler(EventType::UserCreated, Duration::from_millis(2), false, true);
        metrics.record_dlq_write_failure();

        // Act
        let snapshot = metrics.snapshot(fixed_time() + TimeDelta::seconds(90), BTreeMap::new());

        // Assert
        let user = &snapshot.event_types["USER_CREATED"];
        assert_eq!(user.published, 2);
        assert_eq!(user.handled, 1);
        assert_eq!(user.failed, 1);
        assert_eq!(user.timed_out, 1);
        assert!((user.avg_handler_latency_ms - 3.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.total_published, 2);
        assert_eq!(snapshot.dlq_write_failures, 1);
        assert_eq!(snapshot.uptime_seconds, 90);
    }

    #[test]
    fn test_empty_snapshot_reports_zero_latency() {
        let metrics = EventBusMetrics::new(fixed_time());
        metrics.record_published(EventType::ChallengeDeleted);

        let snapshot = metrics.snapshot(fixed_time(), BTreeMap::new());

        assert!(snapshot.event_types["CHALLENGE_DELETED"].avg_handler_latency_ms.abs() < f64::EPSILON);
    }
}
