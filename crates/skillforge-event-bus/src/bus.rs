//! The event bus.
//!
//! Handlers for one event run sequentially in subscription order. Each
//! invocation is wrapped in a timeout and a panic guard; any failure is
//! logged, dead-lettered and counted, and the bus moves on to the next
//! handler. `publish` itself never fails.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillforge_core::clock::Clock;
use skillforge_core::dead_letter::{DeadLetterQuery, DeadLetterStatus};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventPayload, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EventBusConfig;
use crate::dead_letter::{DeadLetterService, InMemoryDeadLetterStore};
use crate::history::{EventHistory, HandlerOutcome, HistoryEntry, HistoryQuery};
use crate::metrics::{EventBusMetrics, MetricsSnapshot};

/// Page size used when collecting entries for a bulk retry.
const RETRY_SCAN_PAGE: usize = 200;

/// Identifies one subscription; pass it to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionHandle {
    pub id: Uuid,
    pub event_type: EventType,
    pub handler_name: String,
}

/// Summary of one publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub correlation_id: String,
    pub outcomes: Vec<HandlerOutcome>,
}

impl PublishReport {
    /// Number of handlers invoked.
    #[must_use]
    pub fn handlers_invoked(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of handlers that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    /// Returns true if every handler succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Selects entries for [`EventBus::retry_failed_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryFilter {
    /// Defaults to `PENDING`.
    pub status: Option<DeadLetterStatus>,
    pub event_name: Option<EventType>,
}

/// Outcome of a bulk retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct Subscription {
    id: Uuid,
    handler: Arc<dyn EventHandler>,
}

/// In-process publish/subscribe hub with dead-letter handling.
pub struct EventBus {
    subscriptions: RwLock<HashMap<EventType, Vec<Subscription>>>,
    history: EventHistory,
    metrics: EventBusMetrics,
    dead_letters: Arc<DeadLetterService>,
    clock: Arc<dyn Clock>,
    handler_timeout: Duration,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handler_timeout", &self.handler_timeout)
            .field("history_capacity", &self.history.capacity())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus recording failures through `dead_letters`.
    pub fn new(config: &EventBusConfig, dead_letters: Arc<DeadLetterService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            history: EventHistory::new(config.history_capacity),
            metrics: EventBusMetrics::new(clock.now()),
            dead_letters,
            clock,
            handler_timeout: config.handler_timeout,
        }
    }

    /// Create a bus whose dead letters live in process memory.
    pub fn in_memory(config: &EventBusConfig, clock: Arc<dyn Clock>) -> Self {
        let dead_letters = DeadLetterService::new(
            Arc::new(InMemoryDeadLetterStore::new()),
            Arc::clone(&clock),
            config.max_retries,
        );
        Self::new(config, Arc::new(dead_letters), clock)
    }

    /// The dead-letter service this bus records into.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<DeadLetterService> {
        &self.dead_letters
    }

    /// Register `handler` for `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the handler name is empty or
    /// already subscribed to `event_type`.
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle, DomainError> {
        let handler_name = handler.name().to_owned();
        if handler_name.trim().is_empty() {
            return Err(DomainError::invalid_argument("handler name must not be empty"));
        }

        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let handlers = subscriptions.entry(event_type).or_default();
        if handlers.iter().any(|s| s.handler.name() == handler_name) {
            return Err(DomainError::invalid_argument(format!(
                "handler {handler_name} is already subscribed to {event_type}"
            )));
        }

        let id = Uuid::new_v4();
        handlers.push(Subscription { id, handler });
        info!(event_type = %event_type, handler = %handler_name, "handler subscribed");

        Ok(SubscriptionHandle {
            id,
            event_type,
            handler_name,
        })
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = subscriptions.get_mut(&handle.event_type) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|s| s.id != handle.id);
        let removed = handlers.len() != before;
        if removed {
            info!(event_type = %handle.event_type, handler = %handle.handler_name, "handler unsubscribed");
        }
        removed
    }

    /// Handler names per event type, in invocation order.
    #[must_use]
    pub fn subscriptions(&self, event_type: Option<EventType>) -> BTreeMap<EventType, Vec<String>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(t, handlers)| event_type.is_none_or(|wanted| wanted == **t) && !handlers.is_empty())
            .map(|(t, handlers)| (*t, handlers.iter().map(|s| s.handler.name().to_owned()).collect()))
            .collect()
    }

    /// Build an event from `data` and publish it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `data` is not an object
    /// carrying an entity identifier.
    pub async fn publish_event(&self, event_type: EventType, data: Value) -> Result<PublishReport, DomainError> {
        let event = DomainEvent::new(event_type, data, self.clock.as_ref())?;
        Ok(self.publish(&event).await)
    }

    /// Publish a typed payload under its event type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the payload lacks its entity
    /// identifier.
    pub async fn publish_payload<P: EventPayload>(&self, payload: &P) -> Result<PublishReport, DomainError> {
        let event = DomainEvent::from_payload(payload, self.clock.as_ref())?;
        Ok(self.publish(&event).await)
    }

    /// Deliver `event` to every handler subscribed to its type.
    #[instrument(
        skip(self, event),
        fields(event_id = %event.id(), event_type = %event.event_type(), correlation_id = %event.correlation_id())
    )]
    pub async fn publish(&self, event: &DomainEvent) -> PublishReport {
        let event_type = event.event_type();
        let timestamp = self.clock.now();
        let handlers = self.handlers_for(event_type);
        self.metrics.record_published(event_type);

        if handlers.is_empty() {
            debug!("no handlers subscribed; event recorded in history only");
        }

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            outcomes.push(self.dispatch(handler.as_ref(), event).await);
        }

        let report = PublishReport {
            event_id: event.id(),
            event_type,
            correlation_id: event.correlation_id().to_owned(),
            outcomes,
        };
        self.history.push(HistoryEntry {
            event_id: report.event_id,
            event_type,
            correlation_id: report.correlation_id.clone(),
            timestamp,
            handler_results: report.outcomes.clone(),
        });
        debug!(handlers = report.handlers_invoked(), failed = report.failed(), "event published");
        report
    }

    /// Recent publishes, most recent first.
    #[must_use]
    pub fn history(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        self.history.query(query)
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let subscriptions = self
            .subscriptions(None)
            .into_iter()
            .map(|(t, names)| (t.as_str().to_owned(), names.len()))
            .collect();
        self.metrics.snapshot(self.clock.now(), subscriptions)
    }

    /// Replay a dead-lettered event through the handler that failed it.
    ///
    /// Returns whether the handler succeeded this time. A handler that is no
    /// longer subscribed counts as a failed attempt.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` for a resolved entry, or
    /// the store error.
    #[instrument(skip(self))]
    pub async fn retry_from_dlq(&self, id: Uuid) -> Result<bool, DomainError> {
        let lock = self.dead_letters.lock_entry(id).await;
        let entry = self.dead_letters.mark_retrying(&lock).await?;

        let result = match self.find_handler(entry.event_type, &entry.handler_name) {
            Some(handler) => self.invoke(handler.as_ref(), &entry.event).await.0,
            None => Err(HandlerError::execution(format!(
                "handler {} is no longer subscribed to {}",
                entry.handler_name, entry.event_type
            ))),
        };

        let success = result.is_ok();
        match result {
            Ok(()) => {
                self.dead_letters.record_retry_success(&lock).await?;
            }
            Err(e) => {
                self.dead_letters.record_retry_failure(&lock, &e.to_string()).await?;
            }
        }
        self.metrics.record_retry(success);
        Ok(success)
    }

    /// Retry every entry matching `filter`.
    ///
    /// Entries that change state concurrently are skipped; per-entry store
    /// failures are logged and counted as failed.
    ///
    /// # Errors
    ///
    /// Returns the store error if the matching entries cannot be listed.
    #[instrument(skip(self))]
    pub async fn retry_failed_events(&self, filter: &RetryFilter) -> Result<RetrySummary, DomainError> {
        let mut query = DeadLetterQuery {
            status: Some(filter.status.unwrap_or(DeadLetterStatus::Pending)),
            event_type: filter.event_name,
            limit: RETRY_SCAN_PAGE,
            offset: 0,
        };
        let mut ids = Vec::new();
        loop {
            let page = self.dead_letters.failed_events(&query).await?;
            let fetched = page.len();
            ids.extend(page.into_iter().map(|e| e.id));
            if fetched < query.limit {
                break;
            }
            query.offset += fetched;
        }

        let mut summary = RetrySummary::default();
        for id in ids {
            match self.retry_from_dlq(id).await {
                Ok(true) => {
                    summary.attempted += 1;
                    summary.succeeded += 1;
                }
                Ok(false) => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
                Err(DomainError::NotFound(_) | DomainError::InvalidState(_)) => {
                    debug!(dead_letter_id = %id, "entry changed during bulk retry; skipped");
                }
                Err(e) => {
                    error!(dead_letter_id = %id, error = %e, "bulk retry could not update entry");
                    summary.attempted += 1;
                    summary.failed += 1;
                }
            }
        }
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "bulk dead letter retry finished"
        );
        Ok(summary)
    }

    fn handlers_for(&self, event_type: EventType) -> Vec<Arc<dyn EventHandler>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_type)
            .map(|handlers| handlers.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default()
    }

    fn find_handler(&self, event_type: EventType, name: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers_for(event_type)
            .into_iter()
            .find(|h| h.name() == name)
    }

    async fn dispatch(&self, handler: &dyn EventHandler, event: &DomainEvent) -> HandlerOutcome {
        let (result, elapsed) = self.invoke(handler, event).await;
        let timed_out = matches!(result, Err(HandlerError::Timeout(_)));
        self.metrics
            .record_handler(event.event_type(), elapsed, result.is_ok(), timed_out);

        let mut outcome = HandlerOutcome {
            handler: handler.name().to_owned(),
            success: result.is_ok(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error: None,
            dead_letter_id: None,
        };

        if let Err(e) = result {
            let message = e.to_string();
            warn!(handler = %handler.name(), error = %message, "event handler failed");
            match self
                .dead_letters
                .record_failure(event, handler.name(), &message)
                .await
            {
                Ok(entry) => outcome.dead_letter_id = Some(entry.id),
                Err(dlq_error) => {
                    self.metrics.record_dlq_write_failure();
                    error!(
                        handler = %handler.name(),
                        error = %dlq_error,
                        "handler failure could not be dead-lettered"
                    );
                }
            }
            outcome.error = Some(message);
        }
        outcome
    }

    async fn invoke(&self, handler: &dyn EventHandler, event: &DomainEvent) -> (Result<(), HandlerError>, Duration) {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(handler.handle(event)).catch_unwind();
        let result = match tokio::time::timeout(self.handler_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_owned()
                };
                error!(handler = %handler.name(), panic = %message, "event handler panicked");
                Err(HandlerError::Panicked(message))
            }
            Err(_) => Err(HandlerError::Timeout(self.handler_timeout)),
        };
        (result, started.elapsed())
    }
}
