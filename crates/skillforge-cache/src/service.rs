//! Cache service: TTL defaults, hit/miss logging and enable toggling on top
//! of a [`CacheProvider`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use skillforge_core::cache::{CacheError, CacheProvider};
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that returned nothing.
    pub misses: u64,
    /// Backend errors observed on any operation.
    pub errors: u64,
    /// Whether the service is enabled.
    pub enabled: bool,
}

/// Uniform caching surface used by query paths and the invalidation manager.
///
/// Read errors degrade to misses so a broken backend never fails a request.
/// Write and delete errors are returned; callers decide whether to swallow
/// them.
pub struct CacheService {
    provider: Arc<dyn CacheProvider>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl CacheService {
    /// Create a service over `provider`.
    pub fn new(provider: Arc<dyn CacheProvider>, config: CacheConfig) -> Self {
        if !config.enabled {
            tracing::info!(provider = provider.name(), "cache disabled; all reads will miss");
        }
        Self {
            provider,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Build the configured provider and wrap it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` if the backend cannot be built.
    pub fn from_config(config: CacheConfig) -> Result<Self, CacheError> {
        let provider = config.build_provider()?;
        Ok(Self::new(provider, config))
    }

    /// Whether caching is switched on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// TTL applied when none is given.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Backend name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Fetch a raw value.
    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        match self.provider.get(key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                if self.config.log_hits {
                    debug!(key = %key, "cache hit");
                }
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                if self.config.log_misses {
                    debug!(key = %key, "cache miss");
                }
                None
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, provider = self.provider.name(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Fetch and decode a JSON value. Undecodable values count as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "cached value could not be decoded");
                None
            }
        }
    }

    /// Store a raw value; `ttl` falls back to the configured default.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        self.track(self.provider.set(key, value, ttl).await)
    }

    /// Encode and store a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Serialization` or the backend error.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set(key, raw, ttl).await
    }

    /// Delete one key.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn del(&self, key: &str) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }
        self.track(self.provider.del(key).await)
    }

    /// Delete every key matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidPattern` or the backend error.
    pub async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        if !self.config.enabled {
            return Ok(0);
        }
        self.track(self.provider.del_pattern(pattern).await)
    }

    /// Read-through helper: return the cached value or compute, store and
    /// return it. A failed store is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns whatever `load` returns.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get_json(key).await {
            return Ok(cached);
        }
        let value = load().await?;
        if let Err(e) = self.set_json(key, &value, ttl).await {
            warn!(key = %key, error = %e, "failed to populate cache");
        }
        Ok(value)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }

    fn track<T>(&self, result: Result<T, CacheError>) -> Result<T, CacheError> {
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
