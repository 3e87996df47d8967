//! SkillForge Cache: providers, cache service and domain-aware invalidation.
//!
//! ```text
//! CacheInvalidationManager ──► CacheService ──► dyn CacheProvider
//!                                                 ├─ MemoryCacheProvider (DashMap)
//!                                                 └─ RedisCacheProvider (deadpool-redis)
//! ```

pub mod config;
pub mod invalidation;
pub mod memory;
pub mod pattern;
pub mod redis;
pub mod service;

pub use config::{CacheConfig, CacheProviderKind};
pub use invalidation::{CacheInvalidationManager, InvalidationPlan, InvalidationReport};
pub use memory::MemoryCacheProvider;
pub use pattern::{KeyPattern, escape_glob};
pub use redis::RedisCacheProvider;
pub use service::{CacheService, CacheStats};
