//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use skillforge_cache::{CacheConfig, CacheInvalidationManager, CacheService, MemoryCacheProvider};
use skillforge_core::cache::CacheProvider;
use skillforge_event_bus::{EventBus, EventBusConfig};
use skillforge_test_support::FixedClock;
use tower::ServiceExt;

use skillforge_api::state::AppState;
use skillforge_api::{app, register_domain_handlers};

/// Build the full app over an in-memory cache with every domain handler
/// registered. Uses the same wiring as `build_state`, minus the database.
pub fn build_test_app() -> (Router, AppState) {
    build_test_app_with_provider(Arc::new(MemoryCacheProvider::new()))
}

/// Same as [`build_test_app`] over a caller-supplied cache backend.
pub fn build_test_app_with_provider(provider: Arc<dyn CacheProvider>) -> (Router, AppState) {
    let bus = Arc::new(EventBus::in_memory(
        &EventBusConfig::default(),
        Arc::new(FixedClock::default()),
    ));
    let cache = Arc::new(CacheService::new(provider, CacheConfig::default()));
    let invalidation = Arc::new(CacheInvalidationManager::new(Arc::clone(&cache)));
    register_domain_handlers(&bus, &invalidation).unwrap();

    let state = AppState::new(bus, cache);
    (app(state.clone()), state)
}

/// Send a request with an optional JSON body and return the response.
/// Non-JSON bodies come back as `Value::Null`.
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}
