//! Cache provider abstraction.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed a command.
    #[error("cache command failed: {0}")]
    Command(String),

    /// A value could not be encoded or decoded.
    #[error("cache serialization failed: {0}")]
    Serialization(String),

    /// A key pattern could not be compiled.
    #[error("invalid cache pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Uniform get/set/delete/scan operations over a backing key-value store.
///
/// Values are serialized read models. Patterns use glob syntax: `*` matches
/// any run of characters (including `:`), `?` matches exactly one.
/// Pattern deletion is O(keyspace scanned).
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Short backend name for logs (`memory`, `redis`).
    fn name(&self) -> &'static str;

    /// Fetch a value; `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete one key. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching `pattern`, returning how many were removed.
    async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
}
