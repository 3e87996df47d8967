//! Test dead-letter stores.

use async_trait::async_trait;
use skillforge_core::dead_letter::{DeadLetterEntry, DeadLetterQuery, DeadLetterStatus, DeadLetterStore};
use skillforge_core::error::DomainError;
use uuid::Uuid;

/// A dead-letter store that always returns an infrastructure error. Useful
/// for testing what happens when failures cannot be recorded.
#[derive(Debug, Clone, Copy)]
pub struct FailingDeadLetterStore;

#[async_trait]
impl DeadLetterStore for FailingDeadLetterStore {
    async fn insert(&self, _entry: &DeadLetterEntry) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get(&self, _id: Uuid) -> Result<Option<DeadLetterEntry>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list(&self, _query: &DeadLetterQuery) -> Result<Vec<DeadLetterEntry>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn update(&self, _entry: &DeadLetterEntry) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn delete(&self, _id: Uuid) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn count_by_status(&self) -> Result<Vec<(DeadLetterStatus, u64)>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
