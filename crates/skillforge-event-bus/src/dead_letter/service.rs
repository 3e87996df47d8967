//! Dead-letter service.
//!
//! Wraps a [`DeadLetterStore`] with the entry lifecycle:
//!
//! ```text
//! PENDING ──retry──► RETRYING ──ok──► RESOLVED
//!    ▲                   │
//!    └──── failed ───────┤
//!                        └── failed, retries exhausted ──► FAILED_PERMANENTLY
//! ```
//!
//! Mutations on one entry are serialized through a per-entry async mutex.
//! Reads never take the lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use skillforge_core::clock::Clock;
use skillforge_core::dead_letter::{DeadLetterEntry, DeadLetterQuery, DeadLetterStatus, DeadLetterStore};
use skillforge_core::error::DomainError;
use skillforge_core::event::DomainEvent;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Counts per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

type LockTable = DashMap<Uuid, Arc<Mutex<()>>>;

/// Exclusive hold on one entry for the duration of a retry.
///
/// Obtained from [`DeadLetterService::lock_entry`]; the retry bookkeeping
/// methods take it by reference so they can only run while it is held.
/// Dropping the last hold on an id removes its mutex from the lock table.
#[derive(Debug)]
pub struct EntryLock {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the table is left.
        self.table.remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl EntryLock {
    /// Locked entry id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Records handler failures and manages their lifecycle.
pub struct DeadLetterService {
    store: Arc<dyn DeadLetterStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    locks: Arc<LockTable>,
}

impl std::fmt::Debug for DeadLetterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterService")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl DeadLetterService {
    /// Create a service. `max_retries` failed retries move an entry to
    /// `FAILED_PERMANENTLY`.
    pub fn new(store: Arc<dyn DeadLetterStore>, clock: Arc<dyn Clock>, max_retries: u32) -> Self {
        Self {
            store,
            clock,
            max_retries: max_retries.max(1),
            locks: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Persist a `PENDING` entry for a failed handler invocation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store rejects the write.
    #[instrument(skip(self, event, error_message), fields(event_type = %event.event_type(), correlation_id = %event.correlation_id()))]
    pub async fn record_failure(
        &self,
        event: &DomainEvent,
        handler_name: &str,
        error_message: &str,
    ) -> Result<DeadLetterEntry, DomainError> {
        let entry = DeadLetterEntry::new(event, handler_name, error_message, self.clock.now());
        if let Err(e) = self.store.insert(&entry).await {
            error!(handler = %handler_name, error = %e, "failed to record dead letter entry");
            return Err(e);
        }
        info!(dead_letter_id = %entry.id, handler = %handler_name, "handler failure dead-lettered");
        Ok(entry)
    }

    /// Entries matching `query`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn failed_events(&self, query: &DeadLetterQuery) -> Result<Vec<DeadLetterEntry>, DomainError> {
        self.store.list(query).await
    }

    /// Load one entry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown id.
    pub async fn get(&self, id: Uuid) -> Result<DeadLetterEntry, DomainError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("dead letter entry {id}")))
    }

    /// Remove an entry. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn delete_entry(&self, id: Uuid) -> Result<bool, DomainError> {
        let lock = self.lock_entry(id).await;
        let deleted = self.store.delete(id).await?;
        drop(lock);
        if deleted {
            info!(dead_letter_id = %id, "dead letter entry deleted");
        }
        Ok(deleted)
    }

    /// Mark an entry `RESOLVED` without retrying it. Returns false if it did
    /// not exist; resolving a resolved entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn resolve_entry(&self, id: Uuid) -> Result<bool, DomainError> {
        let _lock = self.lock_entry(id).await;
        let Some(mut entry) = self.store.get(id).await? else {
            return Ok(false);
        };
        if entry.status == DeadLetterStatus::Resolved {
            return Ok(true);
        }
        entry.status = DeadLetterStatus::Resolved;
        entry.resolved_at = Some(self.clock.now());
        let updated = self.store.update(&entry).await?;
        if updated {
            info!(dead_letter_id = %id, "dead letter entry resolved manually");
        }
        Ok(updated)
    }

    /// Counts per status, every status present.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn stats(&self) -> Result<DeadLetterStats, DomainError> {
        let mut by_status: BTreeMap<String, u64> = DeadLetterStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_owned(), 0))
            .collect();
        for (status, count) in self.store.count_by_status().await? {
            *by_status.entry(status.as_str().to_owned()).or_default() += count;
        }
        Ok(DeadLetterStats {
            total: by_status.values().sum(),
            by_status,
        })
    }

    /// Wait for exclusive access to one entry.
    pub async fn lock_entry(&self, id: Uuid) -> EntryLock {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        EntryLock {
            id,
            guard: Some(mutex.lock_owned().await),
            table: Arc::clone(&self.locks),
        }
    }

    /// Ids that currently have a lock allocated.
    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    /// Move a locked entry to `RETRYING`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` for a resolved entry.
    pub async fn mark_retrying(&self, lock: &EntryLock) -> Result<DeadLetterEntry, DomainError> {
        let mut entry = self.get(lock.id).await?;
        if entry.status == DeadLetterStatus::Resolved {
            return Err(DomainError::InvalidState(format!(
                "dead letter entry {} is already resolved",
                lock.id
            )));
        }
        entry.status = DeadLetterStatus::Retrying;
        self.save(&entry).await?;
        Ok(entry)
    }

    /// Record a successful retry: the entry becomes `RESOLVED`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the entry vanished, or the store error.
    pub async fn record_retry_success(&self, lock: &EntryLock) -> Result<DeadLetterEntry, DomainError> {
        let mut entry = self.get(lock.id).await?;
        let now = self.clock.now();
        entry.status = DeadLetterStatus::Resolved;
        entry.last_retry_at = Some(now);
        entry.resolved_at = Some(now);
        self.save(&entry).await?;
        info!(dead_letter_id = %entry.id, handler = %entry.handler_name, "dead letter retry succeeded");
        Ok(entry)
    }

    /// Record a failed retry: the retry count grows and the entry returns to
    /// `PENDING`, or becomes `FAILED_PERMANENTLY` once retries are exhausted.
    ///
    /// # Errors
    ///
    /// `NotFound` if the entry vanished, or the store error.
    pub async fn record_retry_failure(
        &self,
        lock: &EntryLock,
        error_message: &str,
    ) -> Result<DeadLetterEntry, DomainError> {
        let mut entry = self.get(lock.id).await?;
        entry.retry_count = entry.retry_count.saturating_add(1);
        entry.last_retry_at = Some(self.clock.now());
        error_message.clone_into(&mut entry.error_message);
        entry.status = if entry.retry_count >= self.max_retries {
            DeadLetterStatus::FailedPermanently
        } else {
            DeadLetterStatus::Pending
        };
        self.save(&entry).await?;
        warn!(
            dead_letter_id = %entry.id,
            handler = %entry.handler_name,
            retry_count = entry.retry_count,
            status = %entry.status,
            error = %error_message,
            "dead letter retry failed"
        );
        Ok(entry)
    }

    async fn save(&self, entry: &DeadLetterEntry) -> Result<(), DomainError> {
        if self.store.update(entry).await? {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("dead letter entry {}", entry.id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skillforge_core::event::EventType;
    use skillforge_test_support::{FailingDeadLetterStore, FixedClock, test_event};

    use super::*;
    use crate::dead_letter::InMemoryDeadLetterStore;

    fn service(max_retries: u32) -> DeadLetterService {
        DeadLetterService::new(
            Arc::new(InMemoryDeadLetterStore::new()),
            Arc::new(FixedClock::default()),
            max_retries,
        )
    }

    fn event() -> DomainEvent {
        test_event(EventType::ChallengeUpdated, json!({"challengeId": "c1"}))
    }

    #[tokio::test]
    async fn test_record_failure_persists_pending_entry() {
        let dlq = service(3);

        let entry = dlq.record_failure(&event(), "challenge_cache", "redis down").await.unwrap();

        let stored = dlq.get(entry.id).await.unwrap();
        assert_eq!(stored.status, DeadLetterStatus::Pending);
        assert_eq!(stored.handler_name, "challenge_cache");
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.event, event());
    }

    #[tokio::test]
    async fn test_retry_failures_exhaust_into_failed_permanently() {
        // Arrange
        let dlq = service(2);
        let entry = dlq.record_failure(&event(), "challenge_cache", "boom").await.unwrap();

        // Act
        let mut statuses = Vec::new();
        for _ in 0..2 {
            let lock = dlq.lock_entry(entry.id).await;
            dlq.mark_retrying(&lock).await.unwrap();
            let after = dlq.record_retry_failure(&lock, "still down").await.unwrap();
            statuses.push(after.status);
        }

        // Assert
        assert_eq!(
            statuses,
            vec![DeadLetterStatus::Pending, DeadLetterStatus::FailedPermanently]
        );
        let stored = dlq.get(entry.id).await.unwrap();
        assert_eq!(stored.retry_count, 2);
        assert_eq!(stored.error_message, "still down");
        assert!(stored.last_retry_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_retrying_rejects_resolved_entry() {
        let dlq = service(3);
        let entry = dlq.record_failure(&event(), "challenge_cache", "boom").await.unwrap();
        assert!(dlq.resolve_entry(entry.id).await.unwrap());

        let lock = dlq.lock_entry(entry.id).await;
        let result = dlq.mark_retrying(&lock).await;

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_resolve_and_delete_report_unknown_ids() {
        let dlq = service(3);

        assert!(!dlq.resolve_entry(Uuid::new_v4()).await.unwrap());
        assert!(!dlq.delete_entry(Uuid::new_v4()).await.unwrap());
        assert!(matches!(dlq.get(Uuid::new_v4()).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_zero_fills_every_status() {
        let dlq = service(3);
        let first = dlq.record_failure(&event(), "a", "boom").await.unwrap();
        dlq.record_failure(&event(), "b", "boom").await.unwrap();
        dlq.resolve_entry(first.id).await.unwrap();

        let stats = dlq.stats().await.unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status["PENDING"], 1);
        assert_eq!(stats.by_status["RESOLVED"], 1);
        assert_eq!(stats.by_status["RETRYING"], 0);
        assert_eq!(stats.by_status["FAILED_PERMANENTLY"], 0);
    }

    #[tokio::test]
    async fn test_record_failure_surfaces_store_errors() {
        let dlq = DeadLetterService::new(
            Arc::new(FailingDeadLetterStore),
            Arc::new(FixedClock::default()),
            3,
        );

        let result = dlq.record_failure(&event(), "a", "boom").await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_entry_locks_are_released_after_use() {
        // Arrange
        let dlq = service(3);
        let retried = dlq.record_failure(&event(), "a", "boom").await.unwrap();
        let resolved = dlq.record_failure(&event(), "b", "boom").await.unwrap();

        // Act
        {
            let lock = dlq.lock_entry(retried.id).await;
            dlq.mark_retrying(&lock).await.unwrap();
            dlq.record_retry_failure(&lock, "still down").await.unwrap();
        }
        dlq.resolve_entry(resolved.id).await.unwrap();
        for _ in 0..50 {
            dlq.resolve_entry(Uuid::new_v4()).await.unwrap();
            dlq.delete_entry(Uuid::new_v4()).await.unwrap();
        }

        // Assert
        assert_eq!(dlq.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_waiting_holder_keeps_the_same_lock() {
        // Arrange
        let dlq = Arc::new(service(3));
        let entry = dlq.record_failure(&event(), "a", "boom").await.unwrap();
        let first = dlq.lock_entry(entry.id).await;
        let waiter = {
            let dlq = Arc::clone(&dlq);
            tokio::spawn(async move {
                let lock = dlq.lock_entry(entry.id).await;
                dlq.mark_retrying(&lock).await.map(|e| e.status)
            })
        };
        tokio::task::yield_now().await;

        // Act
        drop(first);
        let status = waiter.await.unwrap().unwrap();

        // Assert
        assert_eq!(status, DeadLetterStatus::Retrying);
        assert_eq!(dlq.tracked_locks(), 0);
    }
}
