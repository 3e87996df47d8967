//! Event handler abstractions.
//!
//! Handlers are asynchronous subscribers invoked by the event bus. They are
//! expected to be idempotent: the bus delivers at least once and dead-letter
//! retries replay the exact same event.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheError;
use crate::error::DomainError;
use crate::event::DomainEvent;

/// Error returned by a handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler logic failed with a message.
    #[error("handler execution failed: {0}")]
    Execution(String),

    /// The event payload lacked a field the handler needs.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A cache operation failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A downstream dependency (database, remote API) failed.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// The handler did not finish within the bus timeout.
    #[error("handler timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Create an execution error from a string.
    pub fn execution(msg: impl Into<String>) -> Self {
        HandlerError::Execution(msg.into())
    }

    /// Create an invalid payload error from a string.
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        HandlerError::InvalidPayload(msg.into())
    }
}

impl From<DomainError> for HandlerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidArgument(msg) => HandlerError::InvalidPayload(msg),
            other => HandlerError::Dependency(other.to_string()),
        }
    }
}

/// An asynchronous subscriber to one or more event types.
///
/// `name` identifies the subscription in history, metrics and dead-letter
/// entries; it must be unique among the handlers of one event type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable handler identifier.
    fn name(&self) -> &str;

    /// Handle one event.
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// Handler backed by an async closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}

/// Wraps an async closure as a named [`EventHandler`].
///
/// ```ignore
/// let handler = handler_fn("audit_log", |event| async move {
///     tracing::info!(event_type = %event.event_type(), "audited");
///     Ok(())
/// });
/// bus.subscribe(EventType::UserCreated, handler)?;
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}
