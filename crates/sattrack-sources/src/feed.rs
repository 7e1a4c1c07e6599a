//! Generic JSON position feed provider.
//!
//! Accepts a bare array of records or an object wrapping one under
//! `objects`, `satellites` or `positions`. Field names are matched loosely so
//! common feed shapes work without per-feed code.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::provider::{PositionProvider, ProviderError, RawPosition};

pub struct JsonFeedProvider {
    name: String,
    url: String,
    client: Client,
}

impl JsonFeedProvider {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            url: url.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PositionProvider for JsonFeedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawPosition>, ProviderError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parse_feed_payload(payload)
    }
}

/// Extract raw records from a feed payload.
pub fn parse_feed_payload(payload: Value) -> Result<Vec<RawPosition>, ProviderError> {
    let records = if let Some(array) = payload.as_array() {
        array.clone()
    } else if let Some(array) = ["objects", "satellites", "positions"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(|v| v.as_array()))
    {
        array.clone()
    } else {
        return Err(ProviderError::Malformed(
            "expected an array of position records".to_string(),
        ));
    };

    Ok(records.iter().filter_map(parse_record).collect())
}

fn parse_record(record: &Value) -> Option<RawPosition> {
    let id = first_id(&[
        record.get("id"),
        record.get("satid"),
        record.get("norad_id"),
        record.get("noradId"),
    ])?;

    Some(RawPosition {
        id,
        name: first_string(&[record.get("name"), record.get("satname")]),
        latitude: first_number(&[
            record.get("latitude"),
            record.get("lat"),
            record.get("satlat"),
        ]),
        longitude: first_number(&[
            record.get("longitude"),
            record.get("lon"),
            record.get("lng"),
            record.get("satlng"),
        ]),
        altitude: first_number(&[
            record.get("altitude"),
            record.get("alt"),
            record.get("altitude_km"),
            record.get("satalt"),
        ]),
        velocity: first_number(&[
            record.get("velocity"),
            record.get("velocity_kms"),
            record.get("speed"),
        ]),
        observed_at: parse_timestamp(
            record
                .get("timestamp")
                .or_else(|| record.get("updated_at"))
                .or_else(|| record.get("lastUpdated")),
        ),
    })
}

fn first_id(candidates: &[Option<&Value>]) -> Option<String> {
    for value in candidates.iter().flatten() {
        if let Some(text) = value.as_str() {
            return Some(text.to_string());
        }
        if let Some(num) = value.as_u64() {
            return Some(num.to_string());
        }
    }
    None
}

fn first_number(candidates: &[Option<&Value>]) -> Option<f64> {
    candidates.iter().find_map(|value| to_f64(*value))
}

fn first_string(candidates: &[Option<&Value>]) -> Option<String> {
    candidates
        .iter()
        .find_map(|value| value.and_then(|v| v.as_str()).map(str::to_string))
}

fn to_f64(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    if let Some(num) = value.as_f64() {
        return Some(num);
    }
    value.as_str()?.trim().parse::<f64>().ok()
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Some(num) = value.as_i64() {
        return from_epoch(num);
    }
    let text = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    text.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value > 1_000_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_array_with_mixed_field_names() {
        let payload = json!([
            {"id": "ISS", "name": "ISS (ZARYA)", "latitude": 51.2, "longitude": -1.0,
             "altitude": 420.0, "velocity": 7.66, "timestamp": 1_714_564_800},
            {"satid": 43013, "satlat": "12.5", "lng": 33.0}
        ]);
        let records = parse_feed_payload(payload).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, "ISS");
        assert_eq!(records[0].velocity, Some(7.66));
        assert!(records[0].observed_at.is_some());

        assert_eq!(records[1].id, "43013");
        assert_eq!(records[1].latitude, Some(12.5));
        assert_eq!(records[1].longitude, Some(33.0));
        assert_eq!(records[1].altitude, None);
    }

    #[test]
    fn parses_wrapped_payload_and_skips_records_without_id() {
        let payload = json!({"satellites": [{"name": "anonymous", "lat": 1.0, "lon": 2.0},
                                            {"id": "OK", "lat": 1.0, "lon": 2.0}]});
        let records = parse_feed_payload(payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "OK");
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(matches!(
            parse_feed_payload(json!({"status": "ok"})),
            Err(ProviderError::Malformed(_))
        ));
    }
}
