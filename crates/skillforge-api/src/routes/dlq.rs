//! Routes for inspecting and operating the dead-letter queue.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use skillforge_core::dead_letter::{
    DEFAULT_PAGE_SIZE, DeadLetterEntry, DeadLetterQuery, DeadLetterStatus,
};
use skillforge_core::event::EventType;
use skillforge_event_bus::{DeadLetterStats, RetryFilter, RetrySummary};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on `limit` for GET /dlq.
const MAX_PAGE_SIZE: usize = 500;

/// Query string for GET /dlq.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<DeadLetterStatus>,
    pub event_name: Option<EventType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<ListParams> for DeadLetterQuery {
    fn from(params: ListParams) -> Self {
        Self {
            status: params.status,
            event_type: params.event_name,
            limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
            offset: params.offset.unwrap_or(0),
        }
    }
}

/// Response body for GET /dlq.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub entries: Vec<DeadLetterEntry>,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Response body for single-entry operations.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /dlq
async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let query = DeadLetterQuery::from(params);
    let entries = state.bus.dead_letters().failed_events(&query).await?;

    Ok(Json(ListResponse {
        count: entries.len(),
        entries,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// GET /dlq/stats
async fn stats(State(state): State<AppState>) -> Result<Json<DeadLetterStats>, ApiError> {
    Ok(Json(state.bus.dead_letters().stats().await?))
}

/// GET /dlq/{id}
async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeadLetterEntry>, ApiError> {
    Ok(Json(state.bus.dead_letters().get(id).await?))
}

/// POST /dlq/{id}/retry
#[instrument(skip(state))]
async fn retry_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let success = state.bus.retry_from_dlq(id).await?;
    info!(success, "dead letter retry requested");
    Ok(Json(SuccessResponse { success }))
}

/// POST /dlq/retry-all
///
/// The body is optional; without one every `PENDING` entry is retried.
#[instrument(skip(state, filter))]
async fn retry_all(
    State(state): State<AppState>,
    filter: Option<Json<RetryFilter>>,
) -> Result<Json<RetrySummary>, ApiError> {
    let filter = filter.map(|Json(f)| f).unwrap_or_default();
    Ok(Json(state.bus.retry_failed_events(&filter).await?))
}

/// DELETE /dlq/{id}
///
/// `success` is false when no entry has that id.
#[instrument(skip(state))]
async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let success = state.bus.dead_letters().delete_entry(id).await?;
    Ok(Json(SuccessResponse { success }))
}

/// PUT /dlq/{id}/resolve
///
/// `success` is false when no entry has that id.
#[instrument(skip(state))]
async fn resolve_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let success = state.bus.dead_letters().resolve_entry(id).await?;
    Ok(Json(SuccessResponse { success }))
}

/// Returns the router for the dead-letter queue.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dlq", get(list_entries))
        .route("/dlq/stats", get(stats))
        .route("/dlq/retry-all", post(retry_all))
        .route("/dlq/{id}", get(get_entry).delete(delete_entry))
        .route("/dlq/{id}/retry", post(retry_entry))
        .route("/dlq/{id}/resolve", put(resolve_entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use skillforge_cache::{CacheConfig, CacheService, MemoryCacheProvider};
    use skillforge_event_bus::{EventBus, EventBusConfig};
    use skillforge_test_support::{FailingHandler, FixedClock, ToggleHandler};
    use tower::ServiceExt;

    fn test_app_state() -> AppState {
        let bus = EventBus::in_memory(&EventBusConfig::default(), Arc::new(FixedClock::default()));
        let cache = CacheService::new(Arc::new(MemoryCacheProvider::new()), CacheConfig::default());
        AppState::new(Arc::new(bus), Arc::new(cache))
    }

    async fn send(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router().with_state(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn dead_letter_one(state: &AppState, user_id: &str) -> Uuid {
        let report = state
            .bus
            .publish_event(EventType::UserUpdated, json!({ "userId": user_id }))
            .await
            .unwrap();
        report.outcomes[0].dead_letter_id.unwrap()
    }

    #[tokio::test]
    async fn test_list_returns_entries_with_page_bounds() {
        // Arrange
        let state = test_app_state();
        state
            .bus
            .subscribe(EventType::UserUpdated, FailingHandler::new("flaky"))
            .unwrap();
        dead_letter_one(&state, "u1").await;
        dead_letter_one(&state, "u2").await;

        // Act
        let (status, json) = send(&state, "GET", "/dlq?status=PENDING&eventName=USER_UPDATED&limit=1").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert_eq!(json["limit"], 1);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["entries"][0]["handlerName"], "flaky");
        assert_eq!(json["entries"][0]["status"], "PENDING");
    }

    #[tokio::test]
    async fn test_list_caps_oversized_limit() {
        let state = test_app_state();

        let (status, json) = send(&state, "GET", "/dlq?limit=100000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["limit"], 500);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_status() {
        let state = test_app_state();

        let (status, _) = send(&state, "GET", "/dlq?status=LOST").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_retry_reports_success_once_handler_recovers() {
        // Arrange
        let state = test_app_state();
        let handler = ToggleHandler::failing("toggle");
        state
            .bus
            .subscribe(EventType::UserUpdated, handler.clone())
            .unwrap();
        let id = dead_letter_one(&state, "u1").await;
        handler.set_failing(false);

        // Act
        let (status, json) = send(&state, "POST", &format!("/dlq/{id}/retry")).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        let (_, entry) = send(&state, "GET", &format!("/dlq/{id}")).await;
        assert_eq!(entry["status"], "RESOLVED");
    }

    #[tokio::test]
    async fn test_retry_of_unknown_entry_returns_404() {
        let state = test_app_state();

        let (status, json) = send(&state, "POST", &format!("/dlq/{}/retry", Uuid::new_v4())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_retry_all_without_body_retries_pending_entries() {
        // Arrange
        let state = test_app_state();
        state
            .bus
            .subscribe(EventType::UserUpdated, FailingHandler::new("flaky"))
            .unwrap();
        dead_letter_one(&state, "u1").await;
        dead_letter_one(&state, "u2").await;

        // Act
        let (status, json) = send(&state, "POST", "/dlq/retry-all").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "attempted": 2, "succeeded": 0, "failed": 2 }));
    }

    #[tokio::test]
    async fn test_resolve_then_retry_conflicts() {
        // Arrange
        let state = test_app_state();
        state
            .bus
            .subscribe(EventType::UserUpdated, FailingHandler::new("flaky"))
            .unwrap();
        let id = dead_letter_one(&state, "u1").await;

        // Act
        let (resolve_status, resolve_json) = send(&state, "PUT", &format!("/dlq/{id}/resolve")).await;
        let (retry_status, retry_json) = send(&state, "POST", &format!("/dlq/{id}/retry")).await;

        // Assert
        assert_eq!(resolve_status, StatusCode::OK);
        assert_eq!(resolve_json["success"], true);
        assert_eq!(retry_status, StatusCode::CONFLICT);
        assert_eq!(retry_json["error"], "invalid_state");
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_second_delete_reports_failure() {
        // Arrange
        let state = test_app_state();
        state
            .bus
            .subscribe(EventType::UserUpdated, FailingHandler::new("flaky"))
            .unwrap();
        let id = dead_letter_one(&state, "u1").await;

        // Act
        let (first, json) = send(&state, "DELETE", &format!("/dlq/{id}")).await;
        let (second, second_json) = send(&state, "DELETE", &format!("/dlq/{id}")).await;

        // Assert
        assert_eq!(first, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(second_json, json!({ "success": false }));
    }

    #[tokio::test]
    async fn test_resolve_of_unknown_entry_reports_failure() {
        let state = test_app_state();

        let (status, json) = send(&state, "PUT", &format!("/dlq/{}/resolve", Uuid::new_v4())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "success": false }));
    }

    #[tokio::test]
    async fn test_stats_counts_every_status() {
        // Arrange
        let state = test_app_state();
        state
            .bus
            .subscribe(EventType::UserUpdated, FailingHandler::new("flaky"))
            .unwrap();
        let id = dead_letter_one(&state, "u1").await;
        dead_letter_one(&state, "u2").await;
        send(&state, "PUT", &format!("/dlq/{id}/resolve")).await;

        // Act
        let (status, json) = send(&state, "GET", "/dlq/stats").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 2);
        assert_eq!(json["byStatus"]["PENDING"], 1);
        assert_eq!(json["byStatus"]["RESOLVED"], 1);
        assert_eq!(json["byStatus"]["RETRYING"], 0);
        assert_eq!(json["byStatus"]["FAILED_PERMANENTLY"], 0);
    }
}
