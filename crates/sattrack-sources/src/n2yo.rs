//! N2YO REST API provider.
//!
//! Uses the `/above` endpoint from a fixed set of seed points: once for the
//! geosynchronous category and once for all categories (kept only below the
//! LEO ceiling). `positions` and `tle` back the server's diagnostic
//! endpoints.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sattrack_core::models::LEO_MAX_ALT_KM;

use crate::provider::{PositionProvider, ProviderError, RawPosition};

pub const DEFAULT_BASE_URL: &str = "https://api.n2yo.com/rest/v1/satellite";

/// N2YO category id for geosynchronous satellites.
pub const GEO_CATEGORY: u32 = 10;
/// N2YO category id meaning "all categories".
pub const ALL_CATEGORIES: u32 = 0;

const SEARCH_RADIUS_KM: u32 = 5_000;
const MAX_PARALLEL_REQUESTS: usize = 4;

/// Seed points covering the globe with few requests (rate limits are tight).
pub const SEED_POINTS: [(f64, f64); 6] = [
    (0.0, 0.0),
    (0.0, 120.0),
    (0.0, 240.0),
    (45.0, 60.0),
    (45.0, 180.0),
    (45.0, 300.0),
];

#[derive(Debug, Deserialize)]
pub struct AboveResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub above: Vec<AboveItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AboveItem {
    pub satid: u64,
    #[serde(default)]
    pub satname: Option<String>,
    #[serde(default)]
    pub satlat: Option<f64>,
    #[serde(default)]
    pub satlng: Option<f64>,
    #[serde(default)]
    pub satalt: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub positions: Vec<PositionSample>,
}

/// One predicted ground-track point from `/positions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    pub satlatitude: f64,
    pub satlongitude: f64,
    pub sataltitude: f64,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub struct TleResponse {
    #[serde(default)]
    pub error: Option<String>,
    pub info: Option<TleInfo>,
    #[serde(default)]
    pub tle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TleInfo {
    pub satid: u64,
    #[serde(default)]
    pub satname: Option<String>,
}

/// Two-line element set for one satellite.
#[derive(Debug, Clone, Serialize)]
pub struct TleRecord {
    pub satid: u64,
    pub satname: Option<String>,
    pub line1: String,
    pub line2: String,
}

impl From<AboveItem> for RawPosition {
    fn from(item: AboveItem) -> Self {
        RawPosition {
            id: item.satid.to_string(),
            name: item.satname,
            latitude: item.satlat,
            longitude: item.satlng,
            altitude: item.satalt,
            velocity: None,
            observed_at: None,
        }
    }
}

/// Thin HTTP client for the N2YO API.
#[derive(Clone)]
pub struct N2yoClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl N2yoClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// `GET /above/{lat}/{lng}/{alt}/{radius}/{category}/`
    pub async fn above(
        &self,
        lat: f64,
        lng: f64,
        radius_km: u32,
        category: u32,
    ) -> Result<Vec<AboveItem>, ProviderError> {
        let parsed: AboveResponse = self
            .get_json(&format!("above/{}/{}/0/{}/{}/", lat, lng, radius_km, category))
            .await?;
        interpret_above(parsed)
    }

    /// `GET /positions/{id}/0/0/0/{seconds}/`, predicted points one second apart.
    pub async fn positions(
        &self,
        satid: u64,
        seconds: u32,
    ) -> Result<Vec<PositionSample>, ProviderError> {
        let parsed: PositionsResponse = self
            .get_json(&format!("positions/{}/0/0/0/{}/", satid, seconds))
            .await?;
        remote_error(parsed.error)?;
        Ok(parsed.positions)
    }

    /// `GET /tle/{id}/`
    pub async fn tle(&self, satid: u64) -> Result<TleRecord, ProviderError> {
        let parsed: TleResponse = self.get_json(&format!("tle/{}/", satid)).await?;
        interpret_tle(parsed)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

fn remote_error(error: Option<String>) -> Result<(), ProviderError> {
    match error {
        Some(message) if is_rate_limit(&message) => Err(ProviderError::RateLimited(message)),
        Some(message) if !message.trim().is_empty() => Err(ProviderError::Remote(message)),
        _ => Ok(()),
    }
}

/// Split the CRLF-joined element set into its two lines.
pub fn interpret_tle(response: TleResponse) -> Result<TleRecord, ProviderError> {
    remote_error(response.error)?;
    let info = response
        .info
        .ok_or_else(|| ProviderError::Malformed("tle response without info".to_string()))?;
    let mut lines = response.tle.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(line1), Some(line2)) => Ok(TleRecord {
            satid: info.satid,
            satname: info.satname,
            line1: line1.to_string(),
            line2: line2.to_string(),
        }),
        _ => Err(ProviderError::Malformed(format!(
            "no element set for {}",
            info.satid
        ))),
    }
}

/// Turn an `/above` body into items, mapping in-band errors.
pub fn interpret_above(response: AboveResponse) -> Result<Vec<AboveItem>, ProviderError> {
    remote_error(response.error)?;
    Ok(response.above)
}

fn is_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("exceeded") || lower.contains("rate limit")
}

/// Provider sweeping the seed points through [`N2yoClient`].
pub struct N2yoProvider {
    client: N2yoClient,
    seeds: Vec<(f64, f64)>,
    radius_km: u32,
}

impl N2yoProvider {
    pub fn new(client: N2yoClient) -> Self {
        Self {
            client,
            seeds: SEED_POINTS.to_vec(),
            radius_km: SEARCH_RADIUS_KM,
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<(f64, f64)>) -> Self {
        self.seeds = seeds;
        self
    }
}

#[async_trait]
impl PositionProvider for N2yoProvider {
    fn name(&self) -> &str {
        "n2yo"
    }

    async fn fetch(&self) -> Result<Vec<RawPosition>, ProviderError> {
        let mut geo_results = Vec::new();
        let mut all_results = Vec::new();

        for batch in self.seeds.chunks(MAX_PARALLEL_REQUESTS) {
            let geo = join_all(batch.iter().map(|&(lat, lng)| {
                self.client.above(lat, lng, self.radius_km, GEO_CATEGORY)
            }));
            let all = join_all(batch.iter().map(|&(lat, lng)| {
                self.client.above(lat, lng, self.radius_km, ALL_CATEGORIES)
            }));
            let (geo, all) = futures::join!(geo, all);

            let rate_limited = geo
                .iter()
                .chain(all.iter())
                .any(|r| matches!(r, Err(ProviderError::RateLimited(_))));
            geo_results.extend(geo);
            all_results.extend(all);

            if rate_limited {
                tracing::warn!("N2YO rate limit hit; skipping remaining seed points");
                break;
            }
        }

        collect_above(geo_results, all_results)
    }
}

/// Merge GEO and all-category sweeps. Fails only when nothing succeeded.
fn collect_above(
    geo: Vec<Result<Vec<AboveItem>, ProviderError>>,
    all: Vec<Result<Vec<AboveItem>, ProviderError>>,
) -> Result<Vec<RawPosition>, ProviderError> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut last_error = None;
    let mut any_ok = false;

    let tagged = geo
        .into_iter()
        .map(|r| (true, r))
        .chain(all.into_iter().map(|r| (false, r)));

    for (is_geo, result) in tagged {
        match result {
            Ok(items) => {
                any_ok = true;
                for item in items {
                    let low_orbit = item.satalt.unwrap_or(0.0) < LEO_MAX_ALT_KM;
                    if !is_geo && !low_orbit {
                        continue;
                    }
                    if seen.insert(item.satid) {
                        records.push(RawPosition::from(item));
                    }
                }
            }
            Err(err) => {
                tracing::warn!("N2YO request failed: {}", err);
                last_error = Some(err);
            }
        }
    }

    match (any_ok, last_error) {
        (false, Some(err)) => Err(err),
        _ => Ok(records),
    }
}
