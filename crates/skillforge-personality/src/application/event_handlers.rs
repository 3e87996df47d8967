//! Event handlers for the Personality context.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::CacheInvalidationManager;
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{PersonalityInsightsGenerated, PersonalityProfileUpdated};

pub const PERSONALITY_CACHE_HANDLER: &str = "personality_cache_invalidation";

pub const PERSONALITY_CACHE_EVENTS: [EventType; 2] = [
    EventType::PersonalityProfileUpdated,
    EventType::PersonalityInsightsGenerated,
];

/// Drops `personality:<user>` and `personality:byUser:<user>:*`.
#[derive(Debug, Clone)]
pub struct PersonalityCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl PersonalityCacheHandler {
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl EventHandler for PersonalityCacheHandler {
    fn name(&self) -> &str {
        PERSONALITY_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let user_id = match event.event_type() {
            EventType::PersonalityProfileUpdated => event.payload::<PersonalityProfileUpdated>()?.user_id,
            EventType::PersonalityInsightsGenerated => event.payload::<PersonalityInsightsGenerated>()?.user_id,
            other => {
                return Err(HandlerError::invalid_payload(format!(
                    "{PERSONALITY_CACHE_HANDLER} does not handle {other}"
                )));
            }
        };
        let report = self.cache.invalidate_personality_caches(&user_id).await?;
        debug!(user_id = %user_id, patterns_matched = report.patterns_matched, "personality caches invalidated");
        Ok(())
    }
}

/// Subscribes the Personality context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_personality_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(PersonalityCacheHandler::new(cache));
    PERSONALITY_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}

#[cfg(test)]
mod tests {
    use skillforge_cache::{CacheConfig, CacheService, MemoryCacheProvider};
    use skillforge_event_bus::EventBusConfig;
    use skillforge_test_support::FixedClock;

    use super::*;

    #[tokio::test]
    async fn test_profile_update_invalidates_only_that_users_profile() {
        // Arrange
        let provider = Arc::new(MemoryCacheProvider::new());
        let service = Arc::new(CacheService::new(provider.clone(), CacheConfig::default()));
        for key in ["personality:u1", "personality:byUser:u1:insights", "personality:u2"] {
            service.set(key, "{}".into(), None).await.unwrap();
        }
        let bus = EventBus::in_memory(&EventBusConfig::default(), Arc::new(FixedClock::default()));
        register_personality_handlers(&bus, Arc::new(CacheInvalidationManager::new(service))).unwrap();

        // Act
        let report = bus
            .publish_payload(&PersonalityProfileUpdated {
                user_id: "u1".into(),
                traits: vec!["openness".into()],
            })
            .await
            .unwrap();

        // Assert
        assert!(report.all_succeeded());
        assert!(!provider.contains_key("personality:u1"));
        assert!(!provider.contains_key("personality:byUser:u1:insights"));
        assert!(provider.contains_key("personality:u2"));
    }
}
