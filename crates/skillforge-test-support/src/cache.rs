//! Test cache providers.

use std::time::Duration;

use async_trait::async_trait;
use skillforge_core::cache::{CacheError, CacheProvider};

/// A cache provider whose every operation fails as if the backend were down.
#[derive(Debug, Clone, Copy)]
pub struct FailingCacheProvider;

#[async_trait]
impl CacheProvider for FailingCacheProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn del(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn del_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}
