//! Shared application state.

use std::sync::Arc;

use skillforge_cache::CacheService;
use skillforge_event_bus::EventBus;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide event bus; also owns the dead-letter service.
    pub bus: Arc<EventBus>,
    /// Cache whose counters are reported next to bus metrics.
    pub cache: Arc<CacheService>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, cache: Arc<CacheService>) -> Self {
        Self { bus, cache }
    }
}
