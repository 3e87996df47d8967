//! In-memory dead-letter store.

use std::cmp::Reverse;

use async_trait::async_trait;
use dashmap::DashMap;
use skillforge_core::dead_letter::{DeadLetterEntry, DeadLetterQuery, DeadLetterStatus, DeadLetterStore};
use skillforge_core::error::DomainError;
use uuid::Uuid;

/// Process-local store. Entries are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterStore {
    entries: DashMap<Uuid, DeadLetterEntry>,
}

impl InMemoryDeadLetterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn insert(&self, entry: &DeadLetterEntry) -> Result<(), DomainError> {
        self.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeadLetterEntry>, DomainError> {
        Ok(self.entries.get(&id).map(|e| e.value().clone()))
    }

    async fn list(&self, query: &DeadLetterQuery) -> Result<Vec<DeadLetterEntry>, DomainError> {
        let mut matching: Vec<DeadLetterEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by_key(|e| Reverse(e.failed_at));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn update(&self, entry: &DeadLetterEntry) -> Result<bool, DomainError> {
        match self.entries.get_mut(&entry.id) {
            Some(mut existing) => {
                *existing = entry.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        Ok(self.entries.remove(&id).is_some())
    }

    async fn count_by_status(&self) -> Result<Vec<(DeadLetterStatus, u64)>, DomainError> {
        Ok(DeadLetterStatus::ALL
            .into_iter()
            .map(|status| {
                let count = self.entries.iter().filter(|e| e.status == status).count();
                (status, count as u64)
            })
            .collect())
    }
}
