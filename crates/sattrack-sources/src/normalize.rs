//! Raw record normalization and cross-provider de-duplication.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sattrack_core::models::{DEFAULT_ALTITUDE_KM, DEFAULT_VELOCITY_KMS};
use sattrack_core::motion::wrap_longitude;
use sattrack_core::TrackedObject;

use crate::provider::RawPosition;

/// Normalize one raw record.
///
/// Missing altitude falls back to 400 km, missing velocity to 7.8 km/s and a
/// missing name to the id. Records without an id or without a horizontal
/// position cannot be placed and are dropped.
pub fn normalize(raw: RawPosition, source: &str, now: DateTime<Utc>) -> Option<TrackedObject> {
    let id = raw.id.trim();
    if id.is_empty() {
        return None;
    }

    let latitude = raw.latitude.filter(|v| v.is_finite())?;
    let longitude = raw.longitude.filter(|v| v.is_finite())?;
    let altitude = raw
        .altitude
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_ALTITUDE_KM);
    let velocity = raw
        .velocity
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_VELOCITY_KMS)
        .max(0.0);
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string());

    let longitude = if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else {
        wrap_longitude(longitude)
    };

    Some(
        TrackedObject::new(id, latitude.clamp(-90.0, 90.0), longitude, altitude)
            .with_name(name)
            .with_velocity(velocity)
            .with_source(source)
            .observed_at(raw.observed_at.unwrap_or(now)),
    )
}

/// Normalize provider batches in priority order, keeping the first record
/// seen for each id.
pub fn merge_first_seen<I>(batches: I, now: DateTime<Utc>) -> Vec<TrackedObject>
where
    I: IntoIterator<Item = (String, Vec<RawPosition>)>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for (source, records) in batches {
        for raw in records {
            let Some(object) = normalize(raw, &source, now) else {
                tracing::debug!("Dropping unplaceable record from {}", source);
                continue;
            };
            if seen.insert(object.id.clone()) {
                merged.push(object);
            }
        }
    }

    merged
}
