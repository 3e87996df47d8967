//! Event handlers for the Focus Area context.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::invalidation::domains;
use skillforge_cache::{CacheInvalidationManager, InvalidationPlan};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{FocusAreaCreated, FocusAreaSelected, FocusAreasGenerated};

/// Subscription name of [`FocusAreaCacheHandler`].
pub const FOCUS_AREA_CACHE_HANDLER: &str = "focus_area_cache_invalidation";

/// Event types [`FocusAreaCacheHandler`] subscribes to.
pub const FOCUS_AREA_CACHE_EVENTS: [EventType; 3] = [
    EventType::FocusAreaCreated,
    EventType::FocusAreaSelected,
    EventType::FocusAreasGenerated,
];

/// Invalidates a user's focus area views. A selection also drops the
/// user's challenge views, since recommendations follow the active focus.
#[derive(Debug, Clone)]
pub struct FocusAreaCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl FocusAreaCacheHandler {
    /// Creates a handler invalidating through `cache`.
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }

    fn plan(event: &DomainEvent) -> Result<InvalidationPlan, HandlerError> {
        match event.event_type() {
            EventType::FocusAreaCreated => {
                let p: FocusAreaCreated = event.payload()?;
                let plan = InvalidationPlan::user_owned(domains::FOCUS_AREA, &p.user_id);
                Ok(match p.focus_area_id.as_deref() {
                    Some(id) => plan.merge(InvalidationPlan::entity(domains::FOCUS_AREA, id)),
                    None => plan,
                })
            }
            EventType::FocusAreaSelected => {
                let p: FocusAreaSelected = event.payload()?;
                Ok(InvalidationPlan::user_owned(domains::FOCUS_AREA, &p.user_id)
                    .merge(InvalidationPlan::by_user(domains::CHALLENGE, &p.user_id)))
            }
            EventType::FocusAreasGenerated => {
                let p: FocusAreasGenerated = event.payload()?;
                Ok(InvalidationPlan::user_owned(domains::FOCUS_AREA, &p.user_id))
            }
            other => Err(HandlerError::invalid_payload(format!(
                "{FOCUS_AREA_CACHE_HANDLER} does not handle {other}"
            ))),
        }
    }
}

#[async_trait]
impl EventHandler for FocusAreaCacheHandler {
    fn name(&self) -> &str {
        FOCUS_AREA_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let report = self.cache.apply(&Self::plan(event)?).await?;
        debug!(
            event_type = %event.event_type(),
            keys_deleted = report.keys_deleted,
            patterns_matched = report.patterns_matched,
            "focus area caches invalidated"
        );
        Ok(())
    }
}

/// Subscribes the Focus Area context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_focus_area_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(FocusAreaCacheHandler::new(cache));
    FOCUS_AREA_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}
