//! Routes exposing bus metrics and publish history.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use skillforge_cache::CacheStats;
use skillforge_event_bus::{HistoryEntry, HistoryQuery, MetricsSnapshot};
use tracing::info;

use crate::state::AppState;

/// Response body for GET /metrics.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub bus: MetricsSnapshot,
    pub cache: CacheStats,
}

/// Response body for GET /history.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub events: Vec<HistoryEntry>,
    pub count: usize,
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        bus: state.bus.metrics(),
        cache: state.cache.stats(),
    })
}

/// GET /history
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let events = state.bus.history(&query);
    Json(HistoryResponse {
        count: events.len(),
        events,
    })
}

/// DELETE /history
async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.bus.clear_history();
    info!("event history cleared");
    StatusCode::NO_CONTENT
}

/// Returns the router for bus observability.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/history", get(history).delete(clear_history))
}
