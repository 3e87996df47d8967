//! Domain-aware cache invalidation.
//!
//! Every write that changes an entity must drop the canonical entry for that
//! entity plus every derived key built from its id or its denormalized
//! relations. The relations are spelled out per entity family in
//! [`InvalidationPlan`]; nothing is inferred at runtime.
//!
//! Invalidation runs from two triggers: directly from the write path right
//! after a commit, and from event handlers reacting to the published event.
//! Both may run for the same write; every operation here is idempotent.

use std::sync::Arc;

use serde::Serialize;
use skillforge_core::cache::CacheError;
use tracing::{debug, instrument, warn};

use crate::pattern::escape_glob;
use crate::service::CacheService;

/// Cache key domains.
pub mod domains {
    /// User accounts.
    pub const USER: &str = "user";
    /// Challenges.
    pub const CHALLENGE: &str = "challenge";
    /// Evaluations.
    pub const EVALUATION: &str = "evaluation";
    /// Personality profiles.
    pub const PERSONALITY: &str = "personality";
    /// Focus areas.
    pub const FOCUS_AREA: &str = "focusArea";
    /// Progress read models.
    pub const PROGRESS: &str = "progress";
}

/// Canonical key for one entity: `<domain>:<id>`.
#[must_use]
pub fn entity_key(domain: &str, id: &str) -> String {
    format!("{domain}:{id}")
}

/// Keys and patterns to drop for one change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Exact keys.
    pub keys: Vec<String>,
    /// Glob patterns.
    pub patterns: Vec<String>,
}

impl InvalidationPlan {
    /// Canonical entry only.
    #[must_use]
    pub fn entity(domain: &str, id: &str) -> Self {
        Self {
            keys: vec![entity_key(domain, id)],
            patterns: Vec::new(),
        }
    }

    /// User entry, its sub-keys and every per-user derived key.
    #[must_use]
    pub fn user(user_id: &str) -> Self {
        Self {
            keys: vec![entity_key(domains::USER, user_id)],
            patterns: vec![
                format!("{}:{}:*", domains::USER, escape_glob(user_id)),
                by_user_everywhere(user_id),
            ],
        }
    }

    /// Challenge entry, its sub-keys and every challenge-scoped derived key.
    #[must_use]
    pub fn challenge(challenge_id: &str) -> Self {
        Self {
            keys: vec![entity_key(domains::CHALLENGE, challenge_id)],
            patterns: vec![
                format!("{}:{}:*", domains::CHALLENGE, escape_glob(challenge_id)),
                by_challenge_everywhere(challenge_id),
            ],
        }
    }

    /// Evaluation entry, cascading to the owning user's progress and derived
    /// keys and to the evaluated challenge, whose views all change on
    /// completion.
    #[must_use]
    pub fn evaluation(evaluation_id: &str, user_id: Option<&str>, challenge_id: Option<&str>) -> Self {
        let mut plan = Self {
            keys: vec![entity_key(domains::EVALUATION, evaluation_id)],
            patterns: vec![format!("{}:{}:*", domains::EVALUATION, escape_glob(evaluation_id))],
        };
        if let Some(user_id) = user_id {
            plan.keys.push(entity_key(domains::PROGRESS, user_id));
            plan.patterns.push(by_user_everywhere(user_id));
        }
        if let Some(challenge_id) = challenge_id {
            plan.keys.push(entity_key(domains::CHALLENGE, challenge_id));
            plan.patterns.push(by_challenge_everywhere(challenge_id));
        }
        plan
    }

    /// A user-owned read model (`personality`, `focusArea`, `progress`).
    #[must_use]
    pub fn user_owned(domain: &str, user_id: &str) -> Self {
        Self {
            keys: vec![entity_key(domain, user_id)],
            patterns: vec![format!("{domain}:byUser:{}:*", escape_glob(user_id))],
        }
    }

    /// Per-user views of a domain (`<domain>:byUser:<user>:*`) without the
    /// canonical entry.
    #[must_use]
    pub fn by_user(domain: &str, user_id: &str) -> Self {
        Self {
            keys: Vec::new(),
            patterns: vec![format!("{domain}:byUser:{}:*", escape_glob(user_id))],
        }
    }

    /// Cached collection/listing results for a domain.
    #[must_use]
    pub fn list(domain: &str) -> Self {
        Self {
            keys: vec![format!("{domain}:list")],
            patterns: vec![format!("{domain}:list:*")],
        }
    }

    /// Combine two plans, dropping duplicates.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for key in other.keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        for pattern in other.patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        self
    }
}

fn by_user_everywhere(user_id: &str) -> String {
    format!("*:byUser:{}:*", escape_glob(user_id))
}

fn by_challenge_everywhere(challenge_id: &str) -> String {
    format!("*:byChallenge:{}:*", escape_glob(challenge_id))
}

/// What an invalidation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    /// Exact keys deleted (absent keys included).
    pub keys_deleted: usize,
    /// Keys removed by pattern deletion.
    pub patterns_matched: u64,
}

/// Translates "entity X changed" into cache deletions.
///
/// Failures are logged at warn level and returned; write paths should call
/// [`CacheInvalidationManager::best_effort`] so a cache outage never fails a
/// committed write, while event handlers propagate the error to the bus.
#[derive(Debug, Clone)]
pub struct CacheInvalidationManager {
    cache: Arc<CacheService>,
}

impl CacheInvalidationManager {
    /// Create a manager over a cache service.
    #[must_use]
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Delete the canonical `<domain>:<id>` entry.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_entity(&self, domain: &str, id: &str) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::entity(domain, id)).await
    }

    /// Delete the user's entry and all per-user derived keys.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_user_caches(&self, user_id: &str) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::user(user_id)).await
    }

    /// Delete the challenge's entry and challenge-scoped derived keys.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_challenge_caches(
        &self,
        challenge_id: &str,
    ) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::challenge(challenge_id)).await
    }

    /// Delete the evaluation entry and cascade to its user and challenge.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_evaluation_caches(
        &self,
        evaluation_id: &str,
        user_id: Option<&str>,
        challenge_id: Option<&str>,
    ) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::evaluation(evaluation_id, user_id, challenge_id))
            .await
    }

    /// Delete a user's personality profile caches.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_personality_caches(
        &self,
        user_id: &str,
    ) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::user_owned(domains::PERSONALITY, user_id))
            .await
    }

    /// Delete a user's focus-area caches.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_focus_area_caches(
        &self,
        user_id: &str,
    ) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::user_owned(domains::FOCUS_AREA, user_id))
            .await
    }

    /// Delete a user's progress caches.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_progress_caches(
        &self,
        user_id: &str,
    ) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::user_owned(domains::PROGRESS, user_id))
            .await
    }

    /// Delete cached listings for a domain.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    pub async fn invalidate_list_caches(&self, domain: &str) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan::list(domain)).await
    }

    /// Delete every key matching an ad hoc pattern.
    ///
    /// # Errors
    ///
    /// Returns the cache error.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<InvalidationReport, CacheError> {
        self.apply(&InvalidationPlan {
            keys: Vec::new(),
            patterns: vec![pattern.to_owned()],
        })
        .await
    }

    /// Execute a plan. Every key and pattern is attempted even after a
    /// failure; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first cache error encountered.
    #[instrument(skip(self, plan), fields(keys = plan.keys.len(), patterns = plan.patterns.len()))]
    pub async fn apply(&self, plan: &InvalidationPlan) -> Result<InvalidationReport, CacheError> {
        let mut report = InvalidationReport::default();
        let mut first_error: Option<CacheError> = None;

        for key in &plan.keys {
            match self.cache.del(key).await {
                Ok(()) => report.keys_deleted += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "cache key invalidation failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        for pattern in &plan.patterns {
            match self.cache.del_pattern(pattern).await {
                Ok(count) => report.patterns_matched += count,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "cache pattern invalidation failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(
                    keys_deleted = report.keys_deleted,
                    patterns_matched = report.patterns_matched,
                    "cache invalidated"
                );
                Ok(report)
            }
        }
    }

    /// Execute a plan from a write path: failures are logged and swallowed.
    pub async fn best_effort(&self, plan: &InvalidationPlan) {
        if let Err(e) = self.apply(plan).await {
            warn!(error = %e, "best-effort cache invalidation failed; entries will age out by TTL");
        }
    }
}

#[cfg(test)]
mod tests {
    use skillforge_test_support::FailingCacheProvider;

    use super::*;
    use crate::config::CacheConfig;
    use crate::memory::MemoryCacheProvider;

    async fn seeded(keys: &[&str]) -> (Arc<MemoryCacheProvider>, CacheInvalidationManager) {
        let provider = Arc::new(MemoryCacheProvider::new());
        let service = Arc::new(CacheService::new(provider.clone(), CacheConfig::default()));
        for key in keys {
            service.set(key, "v".into(), None).await.unwrap();
        }
        (provider, CacheInvalidationManager::new(service))
    }

    #[tokio::test]
    async fn test_invalidate_user_caches_drops_canonical_and_derived_keys() {
        // Arrange
        let (provider, manager) = seeded(&[
            "user:u1",
            "user:u1:profile",
            "progress:byUser:u1:summary",
            "focusArea:byUser:u1:all",
            "user:u2",
        ])
        .await;

        // Act
        manager.invalidate_user_caches("u1").await.unwrap();

        // Assert
        assert!(!provider.contains_key("user:u1"));
        assert!(!provider.contains_key("user:u1:profile"));
        assert!(!provider.contains_key("progress:byUser:u1:summary"));
        assert!(!provider.contains_key("focusArea:byUser:u1:all"));
        assert!(provider.contains_key("user:u2"));
    }

    #[tokio::test]
    async fn test_invalidate_user_caches_is_idempotent() {
        let (provider, manager) = seeded(&["user:u1", "progress:byUser:u1:summary", "user:u2"]).await;

        let first = manager.invalidate_user_caches("u1").await.unwrap();
        let second = manager.invalidate_user_caches("u1").await.unwrap();

        assert_eq!(first.patterns_matched, 1);
        assert_eq!(second.patterns_matched, 0);
        assert!(!provider.contains_key("user:u1"));
        assert!(!provider.contains_key("progress:byUser:u1:summary"));
        assert_eq!(provider.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_evaluation_cascades_to_user_and_challenge() {
        // Arrange
        let (provider, manager) = seeded(&[
            "evaluation:e1",
            "progress:u1",
            "progress:byUser:u1:summary",
            "challenge:c1",
            "evaluation:byChallenge:c1:recent",
            "challenge:c2",
        ])
        .await;

        // Act
        manager
            .invalidate_evaluation_caches("e1", Some("u1"), Some("c1"))
            .await
            .unwrap();

        // Assert
        assert!(!provider.contains_key("evaluation:e1"));
        assert!(!provider.contains_key("progress:u1"));
        assert!(!provider.contains_key("progress:byUser:u1:summary"));
        assert!(!provider.contains_key("challenge:c1"));
        assert!(!provider.contains_key("evaluation:byChallenge:c1:recent"));
        assert!(provider.contains_key("challenge:c2"));
    }

    #[tokio::test]
    async fn test_invalidate_list_caches_leaves_entity_entries() {
        let (provider, manager) =
            seeded(&["challenge:list", "challenge:list:page:1", "challenge:c1"]).await;

        manager.invalidate_list_caches(domains::CHALLENGE).await.unwrap();

        assert!(!provider.contains_key("challenge:list"));
        assert!(!provider.contains_key("challenge:list:page:1"));
        assert!(provider.contains_key("challenge:c1"));
    }

    #[tokio::test]
    async fn test_invalidate_pattern_reports_match_count() {
        let (_, manager) = seeded(&["focusArea:byUser:u1:a", "focusArea:byUser:u1:b"]).await;

        let report = manager.invalidate_pattern("focusArea:*").await.unwrap();

        assert_eq!(report.patterns_matched, 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_returned_but_best_effort_swallows_it() {
        let service = Arc::new(CacheService::new(
            Arc::new(FailingCacheProvider),
            CacheConfig::default(),
        ));
        let manager = CacheInvalidationManager::new(service);

        assert!(manager.invalidate_entity(domains::USER, "u1").await.is_err());
        manager.best_effort(&InvalidationPlan::user("u1")).await;
    }

    #[test]
    fn test_merge_deduplicates() {
        let plan = InvalidationPlan::user("u1").merge(InvalidationPlan::user_owned(domains::PROGRESS, "u1"));

        assert_eq!(plan.keys, vec!["user:u1".to_owned(), "progress:u1".to_owned()]);
        assert_eq!(plan.patterns.len(), 3);
    }

    #[tokio::test]
    async fn test_wildcards_in_ids_do_not_widen_invalidation() {
        // Arrange
        let (provider, manager) = seeded(&[
            "user:*",
            "user:*:profile",
            "progress:byUser:*:summary",
            "user:u2:profile",
            "progress:byUser:u2:summary",
            "challenge:c?:views",
            "challenge:c1:views",
        ])
        .await;

        // Act
        manager.invalidate_user_caches("*").await.unwrap();
        manager.invalidate_challenge_caches("c?").await.unwrap();

        // Assert
        assert!(!provider.contains_key("user:*"));
        assert!(!provider.contains_key("user:*:profile"));
        assert!(!provider.contains_key("progress:byUser:*:summary"));
        assert!(!provider.contains_key("challenge:c?:views"));
        assert!(provider.contains_key("user:u2:profile"));
        assert!(provider.contains_key("progress:byUser:u2:summary"));
        assert!(provider.contains_key("challenge:c1:views"));
    }
}
