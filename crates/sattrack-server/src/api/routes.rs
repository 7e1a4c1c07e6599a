//! REST API routes.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use sattrack_core::{Alert, FleetStats, Severity, TrackedObject};

use crate::api::ws;
use crate::persistence::alerts as alerts_db;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 100;
const MAX_HISTORY_LIMIT: u32 = 1_000;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/fleet", get(list_fleet))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/history", get(alert_history))
        .route("/api/stats", get(get_stats))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/refresh", post(trigger_refresh))
        .route("/ws/stream", get(ws::ws_handler))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    tracked: usize,
    clients: usize,
    synthetic: bool,
    has_api_key: bool,
    motion: &'static str,
    last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    last_provider_error: Option<String>,
    refresh_running: bool,
    proximity_running: bool,
    alert_log: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let source = state.source_status();
    Json(HealthResponse {
        ok: true,
        tracked: state.fleet_snapshot().objects.len(),
        clients: state.subscriber_count(),
        synthetic: source.synthetic,
        has_api_key: state.config().n2yo_api_key.is_some(),
        motion: state.motion_name(),
        last_refresh: source.last_refresh,
        last_provider_error: source.last_provider_error,
        refresh_running: state.refresh_guard().is_running(),
        proximity_running: state.proximity_guard().is_running(),
        alert_log: state.database().is_some(),
    })
}

/// Current fleet ordered by id.
async fn list_fleet(State(state): State<Arc<AppState>>) -> Json<Vec<TrackedObject>> {
    Json(state.fleet_snapshot().objects.clone())
}

#[derive(Debug, Deserialize, Default)]
struct AlertsQuery {
    min_severity: Option<String>,
}

/// Ledger contents, newest first, optionally filtered by minimum severity.
async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<Alert>>, (StatusCode, Json<serde_json::Value>)> {
    let alerts = state.recent_alerts();
    let Some(raw) = query.min_severity.as_deref() else {
        return Ok(Json(alerts));
    };
    let floor: Severity = raw.parse().map_err(|err: sattrack_core::ParseLevelError| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
    })?;
    Ok(Json(
        alerts
            .into_iter()
            .filter(|alert| alert.severity >= floor)
            .collect(),
    ))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<FleetStats> {
    Json(state.stats())
}

/// Pull fallback. Same envelope as the first push message.
async fn get_snapshot(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.snapshot_payload().to_string(),
    )
        .into_response()
}

#[derive(Debug, Deserialize, Default)]
struct HistoryQuery {
    limit: Option<u32>,
}

async fn alert_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(db) = state.database() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "alert log unavailable" })),
        )
            .into_response();
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    match alerts_db::recent_alerts(db.pool(), limit).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(err) => {
            tracing::warn!("Alert history query failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "alert log unavailable" })),
            )
                .into_response()
        }
    }
}

async fn trigger_refresh(State(state): State<Arc<AppState>>) -> Response {
    if state.request_refresh() {
        (StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response()
    } else {
        (StatusCode::CONFLICT, Json(json!({ "status": "running" }))).into_response()
    }
}
