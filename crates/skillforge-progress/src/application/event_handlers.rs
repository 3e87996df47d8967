//! Event handlers for the Progress context.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::CacheInvalidationManager;
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{AchievementUnlocked, ProgressUpdated};

/// Subscription name of [`ProgressCacheHandler`].
pub const PROGRESS_CACHE_HANDLER: &str = "progress_cache_invalidation";

/// Event types [`ProgressCacheHandler`] subscribes to.
pub const PROGRESS_CACHE_EVENTS: [EventType; 2] =
    [EventType::ProgressUpdated, EventType::AchievementUnlocked];

/// Invalidates `progress:<user>` and `progress:byUser:<user>:*`.
///
/// Completions published by the Challenge and Evaluation contexts refresh
/// progress through those contexts' own invalidation plans.
#[derive(Debug, Clone)]
pub struct ProgressCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl ProgressCacheHandler {
    /// Creates a handler invalidating through `cache`.
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }

    /// The user whose progress the event affects.
    fn affected_user(event: &DomainEvent) -> Result<String, HandlerError> {
        match event.event_type() {
            EventType::ProgressUpdated => Ok(event.payload::<ProgressUpdated>()?.user_id),
            EventType::AchievementUnlocked => Ok(event.payload::<AchievementUnlocked>()?.user_id),
            other => Err(HandlerError::invalid_payload(format!(
                "{PROGRESS_CACHE_HANDLER} does not handle {other}"
            ))),
        }
    }
}

#[async_trait]
impl EventHandler for ProgressCacheHandler {
    fn name(&self) -> &str {
        PROGRESS_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let user_id = Self::affected_user(event)?;
        let report = self.cache.invalidate_progress_caches(&user_id).await?;
        debug!(
            user_id = %user_id,
            keys_deleted = report.keys_deleted,
            patterns_matched = report.patterns_matched,
            "progress caches invalidated"
        );
        Ok(())
    }
}

/// Subscribes the Progress context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_progress_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(ProgressCacheHandler::new(cache));
    PROGRESS_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}
