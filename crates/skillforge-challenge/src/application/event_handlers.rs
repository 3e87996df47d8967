//! Event handlers for the Challenge context.

use std::sync::Arc;

use async_trait::async_trait;
use skillforge_cache::invalidation::domains;
use skillforge_cache::{CacheInvalidationManager, InvalidationPlan};
use skillforge_core::error::DomainError;
use skillforge_core::event::{DomainEvent, EventType};
use skillforge_core::handler::{EventHandler, HandlerError};
use skillforge_event_bus::{EventBus, SubscriptionHandle};
use tracing::debug;

use crate::domain::events::{
    ChallengeCompleted, ChallengeCreated, ChallengeDeleted, ChallengeSubmitted, ChallengeUpdated,
};

pub const CHALLENGE_CACHE_HANDLER: &str = "challenge_cache_invalidation";

pub const CHALLENGE_CACHE_EVENTS: [EventType; 5] = [
    EventType::ChallengeCreated,
    EventType::ChallengeUpdated,
    EventType::ChallengeDeleted,
    EventType::ChallengeSubmitted,
    EventType::ChallengeCompleted,
];

/// Invalidates challenge read models, the challenge listings and the
/// owner's per-user challenge views.
#[derive(Debug, Clone)]
pub struct ChallengeCacheHandler {
    cache: Arc<CacheInvalidationManager>,
}

impl ChallengeCacheHandler {
    #[must_use]
    pub fn new(cache: Arc<CacheInvalidationManager>) -> Self {
        Self { cache }
    }
}

fn owner_views(plan: InvalidationPlan, user_id: Option<&str>) -> InvalidationPlan {
    match user_id {
        Some(user_id) => plan.merge(InvalidationPlan::by_user(domains::CHALLENGE, user_id)),
        None => plan,
    }
}

fn plan_for(event: &DomainEvent) -> Result<InvalidationPlan, HandlerError> {
    let list = InvalidationPlan::list(domains::CHALLENGE);
    match event.event_type() {
        EventType::ChallengeCreated => {
            let p: ChallengeCreated = event.payload()?;
            let plan = InvalidationPlan::entity(domains::CHALLENGE, &p.challenge_id).merge(list);
            Ok(owner_views(plan, p.user_id.as_deref()))
        }
        EventType::ChallengeUpdated => {
            let p: ChallengeUpdated = event.payload()?;
            let plan = InvalidationPlan::challenge(&p.challenge_id).merge(list);
            Ok(owner_views(plan, p.user_id.as_deref()))
        }
        EventType::ChallengeDeleted => {
            let p: ChallengeDeleted = event.payload()?;
            let plan = InvalidationPlan::challenge(&p.challenge_id).merge(list);
            Ok(owner_views(plan, p.user_id.as_deref()))
        }
        EventType::ChallengeSubmitted => {
            let p: ChallengeSubmitted = event.payload()?;
            Ok(owner_views(
                InvalidationPlan::challenge(&p.challenge_id),
                p.user_id.as_deref(),
            ))
        }
        EventType::ChallengeCompleted => {
            let p: ChallengeCompleted = event.payload()?;
            let mut plan = owner_views(
                InvalidationPlan::challenge(&p.challenge_id),
                p.user_id.as_deref(),
            );
            if let Some(user_id) = p.user_id.as_deref() {
                plan = plan.merge(InvalidationPlan::user_owned(domains::PROGRESS, user_id));
            }
            Ok(plan)
        }
        other => Err(HandlerError::invalid_payload(format!(
            "{CHALLENGE_CACHE_HANDLER} does not handle {other}"
        ))),
    }
}

#[async_trait]
impl EventHandler for ChallengeCacheHandler {
    fn name(&self) -> &str {
        CHALLENGE_CACHE_HANDLER
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let report = self.cache.apply(&plan_for(event)?).await?;
        debug!(
            challenge_id = event.entity_id().as_deref().unwrap_or_default(),
            keys_deleted = report.keys_deleted,
            patterns_matched = report.patterns_matched,
            "challenge caches invalidated"
        );
        Ok(())
    }
}

/// Subscribes the Challenge context's handlers to `bus`.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if the handlers are already
/// registered.
pub fn register_challenge_handlers(
    bus: &EventBus,
    cache: Arc<CacheInvalidationManager>,
) -> Result<Vec<SubscriptionHandle>, DomainError> {
    let handler: Arc<dyn EventHandler> = Arc::new(ChallengeCacheHandler::new(cache));
    CHALLENGE_CACHE_EVENTS
        .into_iter()
        .map(|event_type| bus.subscribe(event_type, Arc::clone(&handler)))
        .collect()
}
