//! SkillForge API: administrative HTTP surface over the event bus, its
//! dead-letter queue and the shared cache.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use skillforge_cache::{CacheInvalidationManager, CacheService};
use skillforge_core::clock::{Clock, SystemClock};
use skillforge_core::dead_letter::DeadLetterStore;
use skillforge_core::error::DomainError;
use skillforge_event_bus::{
    DeadLetterService, EventBus, InMemoryDeadLetterStore, PgDeadLetterStore, SubscriptionHandle,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::state::AppState;

type Registrar =
    fn(&EventBus, Arc<CacheInvalidationManager>) -> Result<Vec<SubscriptionHandle>, DomainError>;

/// Builds the full router. Health sits at the root; everything else is
/// mounted under `/api/v1/events`.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/events",
            routes::events::router().merge(routes::dlq::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wires the dead-letter store, event bus, cache and every domain's cache
/// handlers from `config`.
///
/// With `DATABASE_URL` set, dead letters are persisted in PostgreSQL and
/// pending migrations are applied first.
///
/// # Errors
///
/// Returns `AppError` if the database, migrations, cache backend or handler
/// registration fail.
pub async fn build_state(config: &ApiConfig) -> Result<AppState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn DeadLetterStore> = if let Some(url) = config.database_url.as_deref() {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("using postgres dead letter store");
        Arc::new(PgDeadLetterStore::new(pool))
    } else {
        warn!("DATABASE_URL not set; dead letter entries are kept in memory");
        Arc::new(InMemoryDeadLetterStore::new())
    };

    let dead_letters = Arc::new(DeadLetterService::new(
        store,
        Arc::clone(&clock),
        config.event_bus.max_retries,
    ));
    let bus = Arc::new(EventBus::new(&config.event_bus, dead_letters, clock));
    let cache = Arc::new(CacheService::from_config(config.cache.clone())?);
    let invalidation = Arc::new(CacheInvalidationManager::new(Arc::clone(&cache)));

    let subscriptions = register_domain_handlers(&bus, &invalidation)?;
    info!(subscriptions, provider = cache.provider_name(), "domain cache handlers registered");

    Ok(AppState::new(bus, cache))
}

/// Subscribes every domain's cache invalidation handler. Returns the number
/// of subscriptions created.
///
/// # Errors
///
/// Returns `DomainError::InvalidArgument` if a handler is already subscribed.
pub fn register_domain_handlers(
    bus: &EventBus,
    invalidation: &Arc<CacheInvalidationManager>,
) -> Result<usize, DomainError> {
    let registrars: [Registrar; 6] = [
        skillforge_user::application::event_handlers::register_user_handlers,
        skillforge_challenge::application::event_handlers::register_challenge_handlers,
        skillforge_evaluation::application::event_handlers::register_evaluation_handlers,
        skillforge_personality::application::event_handlers::register_personality_handlers,
        skillforge_focus_area::application::event_handlers::register_focus_area_handlers,
        skillforge_progress::application::event_handlers::register_progress_handlers,
    ];

    let mut total = 0;
    for register in registrars {
        total += register(bus, Arc::clone(invalidation))?.len();
    }
    Ok(total)
}
