//! Event handlers for the User context.
//!
//! A single cache-invalidation subscriber reacts to every user lifecycle
//! event. Deleting a user also drops the caches of the data the user owns.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::invalidation::domains;
use skillforge_cache::{CacheInvalidationManager, InvalidationPlan};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{UserCreated, UserDeactivated, UserDeleted, UserUpdated};

/// Subscription name of [`UserCacheHandler`].
pub const USER_CACHE_HANDLER: &str = "user_cache_invalidation";

/// Event types [`UserCacheHandler`] subscribes to.
pub const USER_CACHE_EVENTS: [EventType; 4] = [
    EventType::UserCreated,
    EventType::UserUpdated,
    EventType::UserDeactivated,
    EventType::UserDeleted,
];

/// Invalidates user read models when an account changes.
#[derive(Debug, Clone)]
pub struct UserCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl UserCacheHandler {
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }

    fn plan(event: &DomainEvent) -> Result<InvalidationPlan, HandlerError> {
        let list = InvalidationPlan::list(domains::USER);
        let plan = match event.event_type() {
            EventType::UserCreated => {
                let payload: UserCreated = event.payload()?;
                InvalidationPlan::entity(domains::USER, &payload.user_id).merge(list)
            }
            EventType::UserUpdated => {
                let payload: UserUpdated = event.payload()?;
                InvalidationPlan::user(&payload.user_id).merge(list)
            }
            EventType::UserDeactivated => {
                let payload: UserDeactivated = event.payload()?;
                InvalidationPlan::user(&payload.user_id).merge(list)
            }
            EventType::UserDeleted => {
                let payload: UserDeleted = event.payload()?;
                let user_id = payload.user_id.as_str();
                InvalidationPlan::user(user_id)
                    .merge(InvalidationPlan::user_owned(domains::PERSONALITY, user_id))
                    .merge(InvalidationPlan::user_owned(domains::FOCUS_AREA, user_id))
                    .merge(InvalidationPlan::user_owned(domains::PROGRESS, user_id))
                    .merge(list)
            }
            other => {
                return Err(HandlerError::invalid_payload(format!(
                    "{USER_CACHE_HANDLER} does not handle {other}"
                )));
            }
        };
        Ok(plan)
    }
}

#[async_trait]
impl EventHandler for UserCacheHandler {
    fn name(&self) -> &str {
        USER_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let plan = Self::plan(event)?;
        let report = self.cache.apply(&plan).await?;
        debug!(
            event_type = %event.event_type(),
            keys_deleted = report.keys_deleted,
            patterns_matched = report.patterns_matched,
            "user caches invalidated"
        );
        Ok(())
    }
}

/// Subscribes the User context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_user_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(UserCacheHandler::new(cache));
    USER_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skillforge_cache::{CacheConfig, CacheService, MemoryCacheProvider};
    use skillforge_core::dead_letter::DeadLetterQuery;
    use skillforge_event_bus::EventBusConfig;
    use skillforge_test_support::{FixedClock, test_event};

    use super::*;

    async fn setup(keys: &[&str]) -> (EventBus, Arc<MemoryCacheProvider>) {
        let provider = Arc::new(MemoryCacheProvider::new());
        let service = Arc::new(CacheService::new(provider.clone(), CacheConfig::default()));
        for key in keys {
            service.set(key, "{}".into(), None).await.unwrap();
        }
        let bus = EventBus::in_memory(&EventBusConfig::default(), Arc::new(FixedClock::default()));
        register_user_handlers(&bus, Arc::new(CacheInvalidationManager::new(service))).unwrap();
        (bus, provider)
    }

    #[tokio::test]
    async fn test_user_updated_invalidates_user_and_derived_keys() {
        // Arrange
        let (bus, cache) = setup(&[
            "user:u1",
            "user:u1:settings",
            "challenge:byUser:u1:recent",
            "user:list:page:1",
            "user:u2",
        ])
        .await;

        // Act
        let report = bus
            .publish_payload(&UserUpdated {
                user_id: "u1".into(),
                changed_fields: vec!["displayName".into()],
            })
            .await
            .unwrap();

        // Assert
        assert!(report.all_succeeded());
        assert!(!cache.contains_key("user:u1"));
        assert!(!cache.contains_key("user:u1:settings"));
        assert!(!cache.contains_key("challenge:byUser:u1:recent"));
        assert!(!cache.contains_key("user:list:page:1"));
        assert!(cache.contains_key("user:u2"));
    }

    #[tokio::test]
    async fn test_user_deleted_drops_owned_domain_caches() {
        let (bus, cache) = setup(&["personality:u1", "focusArea:u1", "progress:u1", "progress:u2"]).await;

        bus.publish_payload(&UserDeleted { user_id: "u1".into() })
            .await
            .unwrap();

        assert!(!cache.contains_key("personality:u1"));
        assert!(!cache.contains_key("focusArea:u1"));
        assert!(!cache.contains_key("progress:u1"));
        assert!(cache.contains_key("progress:u2"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dead_lettered() {
        let (bus, _) = setup(&[]).await;
        let event = test_event(EventType::UserUpdated, json!({"userId": 42, "changedFields": "name"}));

        bus.publish(&event).await;

        let entries = bus
            .dead_letters()
            .failed_events(&DeadLetterQuery::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].handler_name, USER_CACHE_HANDLER);
    }

    #[test]
    fn test_registering_twice_is_rejected() {
        let bus = EventBus::in_memory(&EventBusConfig::default(), Arc::new(FixedClock::default()));
        let cache = Arc::new(CacheInvalidationManager::new(Arc::new(CacheService::new(
            Arc::new(MemoryCacheProvider::new()),
            CacheConfig::default(),
        ))));

        let first = register_user_handlers(&bus, Arc::clone(&cache));
        let second = register_user_handlers(&bus, cache);

        assert_eq!(first.unwrap().len(), 4);
        assert!(matches!(second, Err(DomainError::InvalidArgument(_))));
    }
}
