//! N2YO provider and diagnostic routes against a local stand-in API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, Json, Router};
use serde_json::{json, Value};

use sattrack_core::MotionKind;
use sattrack_server::{api, config::Config, state::AppState};
use sattrack_sources::{N2yoClient, N2yoProvider, PositionProvider};

fn above_body(rest: &str) -> Value {
    let category = rest.split('/').filter(|part| !part.is_empty()).last();
    match category {
        Some("10") => json!({
            "info": {"category": "Geostationary", "satcount": 1},
            "above": [{"satid": 41866, "satname": "GOES 16", "satlat": 0.0, "satlng": -75.2, "satalt": 35786.0}]
        }),
        _ => json!({
            "info": {"category": "ANY", "satcount": 2},
            "above": [
                {"satid": 25544, "satname": "SPACE STATION", "satlat": 51.6, "satlng": -0.1, "satalt": 420.0},
                {"satid": 28474, "satname": "GPS BIIR-13", "satlat": 12.0, "satlng": 40.0, "satalt": 20180.0}
            ]
        }),
    }
}

async fn spawn_fake_n2yo() -> SocketAddr {
    let app = Router::new()
        .route(
            "/above/*rest",
            get(|Path(rest): Path<String>| async move { Json(above_body(&rest)) }),
        )
        .route(
            "/tle/*rest",
            get(|| async {
                Json(json!({
                    "info": {"satid": 25544, "satname": "SPACE STATION"},
                    "tle": "1 25544U 98067A   24122.50000000  .00016717  00000-0  10270-3 0  9003\r\n2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.50000000 00001"
                }))
            }),
        )
        .route(
            "/positions/*rest",
            get(|| async {
                Json(json!({
                    "info": {"satid": 25544},
                    "positions": [
                        {"satlatitude": 51.0, "satlongitude": 1.0, "sataltitude": 420.0, "timestamp": 1714521600},
                        {"satlatitude": 51.1, "satlongitude": 1.1, "sataltitude": 420.1, "timestamp": 1714521601},
                        {"satlatitude": 51.2, "satlongitude": 1.2, "sataltitude": 420.2, "timestamp": 1714521602}
                    ]
                }))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> N2yoClient {
    N2yoClient::new(format!("http://{}", addr), "test-key", Duration::from_secs(5)).unwrap()
}

async fn spawn_server(n2yo: Option<N2yoClient>, use_synthetic: bool) -> SocketAddr {
    let config = Config {
        motion: MotionKind::Stationary,
        database_path: None,
        use_synthetic,
        ..Config::default()
    };
    let mut state = AppState::new(config).unwrap();
    if let Some(n2yo) = n2yo {
        state = state.with_n2yo(n2yo);
    }
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::app(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn single_seed_sweep_keeps_geo_and_low_orbit() {
    let upstream = spawn_fake_n2yo().await;
    let provider = N2yoProvider::new(client(upstream)).with_seeds(vec![(0.0, 0.0)]);

    let records = provider.fetch().await.unwrap();
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["25544", "41866"]);
}

#[tokio::test]
async fn diagnostics_proxy_the_n2yo_api() {
    let upstream = spawn_fake_n2yo().await;
    let addr = spawn_server(Some(client(upstream)), false).await;
    let http = reqwest::Client::new();

    let above: Value = http
        .get(format!("http://{}/debug/n2yo?lat=10&lng=20", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(above["radius_km"], 5000);
    assert_eq!(above["geo"]["count"], 1);
    assert_eq!(above["all"]["count"], 2);

    let tle: Value = http
        .get(format!("http://{}/debug/tle?satid=25544", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tle["satid"], 25544);
    assert!(tle["line2"].as_str().unwrap().starts_with("2 25544"));

    let positions: Value = http
        .get(format!("http://{}/debug/positions?seconds=3", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(positions["count"], 3);
    assert_eq!(positions["sample"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn diagnostics_are_unavailable_without_n2yo() {
    let http = reqwest::Client::new();

    let addr = spawn_server(None, false).await;
    let response = http
        .get(format!("http://{}/debug/tle", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let upstream = spawn_fake_n2yo().await;
    let addr = spawn_server(Some(client(upstream)), true).await;
    let response = http
        .get(format!("http://{}/debug/positions", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
