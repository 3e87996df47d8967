//! Redis cache provider backed by a `deadpool-redis` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Connection, Pool, Runtime};
use skillforge_core::cache::{CacheError, CacheProvider};

use crate::config::MAX_TTL;

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

/// Cache provider for multi-instance deployments.
///
/// Pattern deletion walks the keyspace with `SCAN MATCH` and deletes each
/// batch, so it is O(keyspace) rather than O(matches).
#[derive(Clone)]
pub struct RedisCacheProvider {
    pool: Pool,
}

impl RedisCacheProvider {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url` on the Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` if the pool cannot be created.
    pub fn from_url(url: &str) -> Result<Self, CacheError> {
        let pool = deadpool_redis::Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(format!("failed to create redis pool: {e}")))?;
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

impl std::fmt::Debug for RedisCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheProvider").finish_non_exhaustive()
    }
}

fn command_error(op: &str, key: &str, err: &redis::RedisError) -> CacheError {
    CacheError::Command(format!("{op} {key}: {err}"))
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| command_error("GET", key, &e))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SET EX rejects a zero expiry.
        let seconds = ttl.min(MAX_TTL).as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| command_error("SETEX", key, &e))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| command_error("DEL", key, &e))
    }

    async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("SCAN", pattern, &e))?;

            if !keys.is_empty() {
                let deleted: u64 = conn
                    .del(keys.as_slice())
                    .await
                    .map_err(|e| command_error("DEL", pattern, &e))?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(pattern = %pattern, removed, "redis pattern delete");
        Ok(removed)
    }
}
