//! In-process cache provider backed by a `DashMap`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use skillforge_core::cache::{CacheError, CacheProvider};
use tokio::time::Instant;

use crate::config::MAX_TTL;
use crate::pattern::KeyPattern;

/// A cached value with its expiry deadline.
#[derive(Clone, Debug)]
struct CachedEntry {
    value: Arc<str>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Single-instance cache. Expired entries are dropped lazily on read, on
/// pattern scans and by [`MemoryCacheProvider::purge_expired`].
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheProvider {
    entries: Arc<DashMap<String, CachedEntry>>,
}

impl MemoryCacheProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `key` holds a live value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.to_string()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).ok_or_else(|| {
            CacheError::Command(format!("SET {key}: ttl of {}s is out of range", ttl.as_secs()))
        })?;
        self.entries.insert(
            key.to_owned(),
            CachedEntry {
                value: Arc::from(value),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let pattern = KeyPattern::new(pattern)?;
        let now = Instant::now();
        let mut removed = 0_u64;
        self.entries.retain(|key, entry| {
            if entry.is_expired(now) {
                return false;
            }
            if pattern.matches(key) {
                removed += 1;
                return false;
            }
            true
        });
        tracing::trace!(pattern = %pattern.as_str(), removed, "memory cache pattern delete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let cache = MemoryCacheProvider::new();

        cache.set("user:u1", "{\"name\":\"Ada\"}".into(), HOUR).await.unwrap();

        assert_eq!(
            cache.get("user:u1").await.unwrap().as_deref(),
            Some("{\"name\":\"Ada\"}")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        // Arrange
        let cache = MemoryCacheProvider::new();
        cache.set("user:u1", "v".into(), Duration::from_secs(5)).await.unwrap();

        // Act
        tokio::time::advance(Duration::from_secs(6)).await;

        // Assert
        assert_eq!(cache.get("user:u1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_drops_only_stale_entries() {
        let cache = MemoryCacheProvider::new();
        cache.set("short", "v".into(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", "v".into(), HOUR).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.contains_key("long"));
    }

    #[tokio::test]
    async fn test_del_pattern_removes_matching_keys_only() {
        // Arrange
        let cache = MemoryCacheProvider::new();
        for key in [
            "progress:byUser:u1:summary",
            "evaluation:byUser:u1:recent",
            "progress:byUser:u2:summary",
            "user:u1",
        ] {
            cache.set(key, "v".into(), HOUR).await.unwrap();
        }

        // Act
        let removed = cache.del_pattern("*:byUser:u1:*").await.unwrap();

        // Assert
        assert_eq!(removed, 2);
        assert!(!cache.contains_key("progress:byUser:u1:summary"));
        assert!(!cache.contains_key("evaluation:byUser:u1:recent"));
        assert!(cache.contains_key("progress:byUser:u2:summary"));
        assert!(cache.contains_key("user:u1"));
    }

    #[tokio::test]
    async fn test_del_of_absent_key_is_not_an_error() {
        let cache = MemoryCacheProvider::new();

        assert!(cache.del("missing").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_with_unbounded_ttl_is_clamped_instead_of_overflowing() {
        // Arrange
        let cache = MemoryCacheProvider::new();

        // Act
        let result = cache.set("user:u1", "v".into(), Duration::MAX).await;
        tokio::time::advance(MAX_TTL - Duration::from_secs(1)).await;
        let before_limit = cache.get("user:u1").await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let after_limit = cache.get("user:u1").await.unwrap();

        // Assert
        assert!(result.is_ok());
        assert_eq!(before_limit.as_deref(), Some("v"));
        assert_eq!(after_limit, None);
    }
}
