//! N2YO diagnostics: raw `/above`, `/tle` and `/positions` lookups for
//! checking credentials and rate limits without waiting for a refresh.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use sattrack_sources::n2yo::{AboveItem, ALL_CATEGORIES, GEO_CATEGORY};
use sattrack_sources::{N2yoClient, ProviderError};

use crate::state::AppState;

const DEFAULT_SATID: u64 = 25_544;
const DEFAULT_RADIUS_KM: u32 = 5_000;
/// N2YO caps `/positions` at 300 seconds.
const MAX_POSITION_SECONDS: u32 = 300;
const SAMPLE_SIZE: usize = 3;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/debug/n2yo", get(debug_above))
        .route("/debug/tle", get(debug_tle))
        .route("/debug/positions", get(debug_positions))
}

type DebugResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn client(state: &AppState) -> Result<&N2yoClient, (StatusCode, Json<Value>)> {
    state.n2yo().ok_or_else(|| {
        let reason = if state.config().use_synthetic {
            "synthetic data forced; N2YO disabled"
        } else {
            "N2YO_API_KEY not set"
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": reason })))
    })
}

fn upstream(err: ProviderError) -> (StatusCode, Json<Value>) {
    tracing::warn!("N2YO diagnostic call failed: {}", err);
    (StatusCode::BAD_GATEWAY, Json(json!({ "error": err.to_string() })))
}

fn summarize(result: Result<Vec<AboveItem>, ProviderError>) -> Value {
    match result {
        Ok(items) => json!({
            "count": items.len(),
            "sample": items.iter().take(SAMPLE_SIZE).collect::<Vec<_>>(),
        }),
        Err(err) => json!({ "error": err.to_string() }),
    }
}

#[derive(Debug, Deserialize)]
struct AboveQuery {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lng: f64,
    radius_km: Option<u32>,
}

/// Both sweeps the provider runs, from one point.
async fn debug_above(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AboveQuery>,
) -> DebugResult {
    let client = client(&state)?;
    let radius_km = query.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
    let (geo, all) = tokio::join!(
        client.above(query.lat, query.lng, radius_km, GEO_CATEGORY),
        client.above(query.lat, query.lng, radius_km, ALL_CATEGORIES),
    );
    Ok(Json(json!({
        "lat": query.lat,
        "lng": query.lng,
        "radius_km": radius_km,
        "geo": summarize(geo),
        "all": summarize(all),
    })))
}

#[derive(Debug, Deserialize)]
struct SatQuery {
    satid: Option<u64>,
    seconds: Option<u32>,
}

async fn debug_tle(State(state): State<Arc<AppState>>, Query(query): Query<SatQuery>) -> Response {
    let satid = query.satid.unwrap_or(DEFAULT_SATID);
    let result = match client(&state) {
        Ok(client) => client.tle(satid).await.map_err(upstream),
        Err(err) => Err(err),
    };
    match result {
        Ok(record) => Json(record).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn debug_positions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SatQuery>,
) -> DebugResult {
    let client = client(&state)?;
    let satid = query.satid.unwrap_or(DEFAULT_SATID);
    let seconds = query.seconds.unwrap_or(60).clamp(1, MAX_POSITION_SECONDS);
    let positions = client.positions(satid, seconds).await.map_err(upstream)?;
    Ok(Json(json!({
        "satid": satid,
        "seconds": seconds,
        "count": positions.len(),
        "sample": positions.iter().take(2).collect::<Vec<_>>(),
    })))
}
