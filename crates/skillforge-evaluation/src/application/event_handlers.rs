//! Event handlers for the Evaluation context.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::{CacheInvalidationManager, InvalidationReport};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{EvaluationCompleted, EvaluationCreated};

/// Subscription name of [`EvaluationCacheHandler`].
pub const EVALUATION_CACHE_HANDLER: &str = "evaluation_cache_invalidation";

/// Event types [`EvaluationCacheHandler`] subscribes to.
pub const EVALUATION_CACHE_EVENTS: [EventType; 2] =
    [EventType::EvaluationCreated, EventType::EvaluationCompleted];

/// Invalidates the evaluation entry and cascades to the evaluated
/// challenge and the evaluated user's derived views.
#[derive(Debug, Clone)]
pub struct EvaluationCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl EvaluationCacheHandler {
    /// Creates a handler invalidating through `cache`.
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }

    async fn invalidate(
        &self,
        evaluation_id: &str,
        user_id: Option<&str>,
        challenge_id: Option<&str>,
    ) -> Result<InvalidationReport, HandlerError> {
        Ok(self
            .cache
            .invalidate_evaluation_caches(evaluation_id, user_id, challenge_id)
            .await?)
    }
}

#[async_trait]
impl EventHandler for EvaluationCacheHandler {
    fn name(&self) -> &str {
        EVALUATION_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let report = match event.event_type() {
            EventType::EvaluationCreated => {
                let p: EvaluationCreated = event.payload()?;
                self.invalidate(&p.evaluation_id, p.user_id.as_deref(), p.challenge_id.as_deref())
                    .await?
            }
            EventType::EvaluationCompleted => {
                let p: EvaluationCompleted = event.payload()?;
                self.invalidate(&p.evaluation_id, p.user_id.as_deref(), p.challenge_id.as_deref())
                    .await?
            }
            other => {
                return Err(HandlerError::invalid_payload(format!(
                    "{EVALUATION_CACHE_HANDLER} does not handle {other}"
                )));
            }
        };
        debug!(
            keys_deleted = report.keys_deleted,
            patterns_matched = report.patterns_matched,
            "evaluation caches invalidated"
        );
        Ok(())
    }
}

/// Subscribes the Evaluation context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_evaluation_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(EvaluationCacheHandler::new(cache));
    EVALUATION_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skillforge_cache::{CacheConfig, CacheService, MemoryCacheProvider};
    use skillforge_core::cache::CacheProvider;
    use skillforge_core::dead_letter::{DeadLetterQuery, DeadLetterStatus};
    use skillforge_event_bus::EventBusConfig;
    use skillforge_test_support::{FailingCacheProvider, FixedClock};

    use super::*;

    fn bus_over(provider: Arc<dyn CacheProvider>) -> EventBus {
        let service = Arc::new(CacheService::new(provider, CacheConfig::default()));
        let bus = EventBus::in_memory(&EventBusConfig::default(), Arc::new(FixedClock::default()));
        register_evaluation_handlers(&bus, Arc::new(CacheInvalidationManager::new(service))).unwrap();
        bus
    }

    async fn dead_letters(bus: &EventBus) -> Vec<skillforge_core::dead_letter::DeadLetterEntry> {
        bus.dead_letters()
            .failed_events(&DeadLetterQuery::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_evaluation_completed_invalidates_evaluation_progress_and_challenge() {
        // Arrange
        let provider = Arc::new(MemoryCacheProvider::new());
        for key in [
            "evaluation:e1",
            "progress:byUser:u1:summary",
            "challenge:c1",
            "challenge:c2",
        ] {
            provider.set(key, "{}".into(), std::time::Duration::from_secs(60)).await.unwrap();
        }
        let bus = bus_over(provider.clone());

        // Act
        let report = bus
            .publish_event(
                EventType::EvaluationCompleted,
                json!({"evaluationId": "e1", "userId": "u1", "challengeId": "c1"}),
            )
            .await
            .unwrap();

        // Assert
        assert!(report.all_succeeded());
        assert!(!provider.contains_key("evaluation:e1"));
        assert!(!provider.contains_key("progress:byUser:u1:summary"));
        assert!(!provider.contains_key("challenge:c1"));
        assert!(provider.contains_key("challenge:c2"));
        assert!(dead_letters(&bus).await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_yields_one_pending_dead_letter_for_the_handler() {
        // Arrange
        let bus = bus_over(Arc::new(FailingCacheProvider));
        let completed = EvaluationCompleted {
            evaluation_id: "e1".into(),
            user_id: Some("u1".into()),
            challenge_id: Some("c1".into()),
            score: Some(0.8),
            passed: Some(true),
        };

        // Act
        let report = bus.publish_payload(&completed).await.unwrap();

        // Assert
        assert_eq!(report.failed(), 1);
        let entries = dead_letters(&bus).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].handler_name, EVALUATION_CACHE_HANDLER);
        assert_eq!(entries[0].status, DeadLetterStatus::Pending);
        assert_eq!(entries[0].event.field("evaluationId").as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn test_evaluation_created_without_relations_only_touches_evaluation() {
        let provider = Arc::new(MemoryCacheProvider::new());
        for key in ["evaluation:e9", "evaluation:e9:draft", "challenge:c1"] {
            provider.set(key, "{}".into(), std::time::Duration::from_secs(60)).await.unwrap();
        }
        let bus = bus_over(provider.clone());

        bus.publish_payload(&EvaluationCreated {
            evaluation_id: "e9".into(),
            user_id: None,
            challenge_id: None,
        })
        .await
        .unwrap();

        assert!(!provider.contains_key("evaluation:e9"));
        assert!(!provider.contains_key("evaluation:e9:draft"));
        assert!(provider.contains_key("challenge:c1"));
    }
}
