//! Cache configuration.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use skillforge_core::cache::{CacheError, CacheProvider};
use skillforge_core::error::DomainError;

use crate::memory::MemoryCacheProvider;
use crate::redis::RedisCacheProvider;

/// Default time-to-live applied when `set` is called without one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest time-to-live any backend will honour; longer requests are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Which backend the cache service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheProviderKind {
    /// In-process `DashMap`.
    #[default]
    Memory,
    /// Remote Redis.
    Redis,
}

impl FromStr for CacheProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(DomainError::invalid_argument(format!(
                "CACHE_PROVIDER must be `memory` or `redis`, got `{other}`"
            ))),
        }
    }
}

/// Recognised cache options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Backend selection.
    pub provider: CacheProviderKind,
    /// TTL used when a caller does not supply one.
    pub default_ttl: Duration,
    /// Log every hit at debug level.
    pub log_hits: bool,
    /// Log every miss at debug level.
    pub log_misses: bool,
    /// When false every operation is a no-op that misses.
    pub enabled: bool,
    /// Connection URL for the Redis backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: CacheProviderKind::Memory,
            default_ttl: DEFAULT_TTL,
            log_hits: false,
            log_misses: false,
            enabled: true,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    /// A configuration with caching switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Reads `CACHE_PROVIDER`, `CACHE_DEFAULT_TTL` (seconds),
    /// `CACHE_LOG_HITS`, `CACHE_LOG_MISSES`, `CACHE_ENABLED` and `REDIS_URL`
    /// from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for unparseable values.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let provider = match lookup("CACHE_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => defaults.provider,
        };
        let default_ttl = match lookup("CACHE_DEFAULT_TTL") {
            Some(raw) => parse_ttl(&raw)?,
            None => defaults.default_ttl,
        };
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        if provider == CacheProviderKind::Redis && redis_url.is_none() {
            return Err(DomainError::invalid_argument(
                "REDIS_URL must be set when CACHE_PROVIDER=redis",
            ));
        }

        Ok(Self {
            provider,
            default_ttl,
            log_hits: parse_flag(&lookup, "CACHE_LOG_HITS", defaults.log_hits)?,
            log_misses: parse_flag(&lookup, "CACHE_LOG_MISSES", defaults.log_misses)?,
            enabled: parse_flag(&lookup, "CACHE_ENABLED", defaults.enabled)?,
            redis_url,
        })
    }

    /// Builds the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` if the Redis pool cannot be built.
    pub fn build_provider(&self) -> Result<Arc<dyn CacheProvider>, CacheError> {
        match (self.provider, self.redis_url.as_deref()) {
            (CacheProviderKind::Redis, Some(url)) => {
                tracing::info!("using redis cache provider");
                Ok(Arc::new(RedisCacheProvider::from_url(url)?))
            }
            (CacheProviderKind::Redis, None) => Err(CacheError::Unavailable(
                "redis provider selected without REDIS_URL".to_owned(),
            )),
            (CacheProviderKind::Memory, _) => {
                tracing::info!("using in-memory cache provider");
                Ok(Arc::new(MemoryCacheProvider::new()))
            }
        }
    }
}

fn parse_ttl(raw: &str) -> Result<Duration, DomainError> {
    let seconds: u64 = raw.trim().parse().map_err(|e| {
        DomainError::invalid_argument(format!("CACHE_DEFAULT_TTL must be seconds: {e}"))
    })?;
    let ttl = Duration::from_secs(seconds);
    if ttl > MAX_TTL {
        return Err(DomainError::invalid_argument(format!(
            "CACHE_DEFAULT_TTL must be at most {}s, got {seconds}",
            MAX_TTL.as_secs()
        )));
    }
    Ok(ttl)
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, DomainError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(DomainError::invalid_argument(format!(
                "{key} must be a boolean, got `{other}`"
            ))),
        },
    }
}
