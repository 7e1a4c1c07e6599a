//! Core data models for the tracking pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper altitude bound (km) for low earth orbit.
pub const LEO_MAX_ALT_KM: f64 = 2_000.0;
/// Altitude (km) from which an object is treated as geosynchronous.
pub const GEO_MIN_ALT_KM: f64 = 35_000.0;

/// Default altitude (km) when a provider omits it.
pub const DEFAULT_ALTITUDE_KM: f64 = 400.0;
/// Default velocity (km/s) when a provider omits it.
pub const DEFAULT_VELOCITY_KMS: f64 = 7.8;

/// Coarse orbit classification derived from altitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitClass {
    Leo,
    Meo,
    Geo,
}

impl OrbitClass {
    pub fn from_altitude(altitude_km: f64) -> Self {
        if altitude_km < LEO_MAX_ALT_KM {
            Self::Leo
        } else if altitude_km < GEO_MIN_ALT_KM {
            Self::Meo
        } else {
            Self::Geo
        }
    }
}

/// Latest known state of one tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedObject {
    pub id: String,
    pub name: String,
    /// Degrees, [-90, 90]
    pub latitude: f64,
    /// Degrees, [-180, 180]
    pub longitude: f64,
    /// Kilometers above the surface
    pub altitude: f64,
    /// Kilometers per second
    pub velocity: f64,
    pub last_updated: DateTime<Utc>,
    /// Provider name, or "synthetic"
    pub source: String,
    pub category: OrbitClass,
}

impl TrackedObject {
    /// Create an object with only the positional fields set.
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64, altitude: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            latitude,
            longitude,
            altitude,
            velocity: DEFAULT_VELOCITY_KMS,
            last_updated: Utc::now(),
            source: "manual".to_string(),
            category: OrbitClass::from_altitude(altitude),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    /// Recompute `category` after the altitude changed.
    pub fn reclassify(&mut self) {
        self.category = OrbitClass::from_altitude(self.altitude);
    }
}

/// Alert severity. Ordered: `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Severity {
    type Err = ParseLevelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ParseLevelError(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Proximity,
    LowAltitude,
    HighVelocity,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proximity => "PROXIMITY",
            Self::LowAltitude => "LOW_ALTITUDE",
            Self::HighVelocity => "HIGH_VELOCITY",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert derived from one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// `<KIND>:<subject>`; stable across cycles for the same condition
    pub id: String,
    /// Object id, or `A-B` pair key
    pub subject_id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    /// Value that crossed the threshold (separation, km or km/s)
    pub metric: f64,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        subject_id: impl Into<String>,
        severity: Severity,
        metric: f64,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let subject_id = subject_id.into();
        Self {
            id: format!("{}:{}", kind.as_str(), subject_id),
            subject_id,
            kind,
            severity,
            message: message.into(),
            metric,
            created_at,
        }
    }
}

/// Order-independent key for a pair of object ids.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

/// Aggregate counts shipped with every fleet payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetCounts {
    pub total: usize,
    pub leo: usize,
    pub meo: usize,
    pub geo: usize,
    pub alerts: usize,
}

impl FleetCounts {
    pub fn tally(objects: &[TrackedObject], alerts: usize) -> Self {
        let mut counts = Self {
            total: objects.len(),
            alerts,
            ..Self::default()
        };
        for object in objects {
            match object.category {
                OrbitClass::Leo => counts.leo += 1,
                OrbitClass::Meo => counts.meo += 1,
                OrbitClass::Geo => counts.geo += 1,
            }
        }
        counts
    }
}

/// Fleet and ledger captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSnapshot {
    pub ts: DateTime<Utc>,
    pub objects: Vec<TrackedObject>,
    pub alerts: Vec<Alert>,
    pub counts: FleetCounts,
}

/// Full replacement fleet published after a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetUpdate {
    pub ts: DateTime<Utc>,
    pub objects: Vec<TrackedObject>,
    pub counts: FleetCounts,
}

/// Alerts produced by the latest proximity pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertBatch {
    pub ts: DateTime<Utc>,
    pub alerts: Vec<Alert>,
}

/// Messages pushed to subscribers.
///
/// The pull endpoint serves the `Snapshot` variant with the same envelope so
/// clients parse both transports identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Snapshot(FullSnapshot),
    FleetUpdated(FleetUpdate),
    AlertsAppended(AlertBatch),
}

/// Aggregate stats endpoint payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetStats {
    pub total_tracked: usize,
    /// Count of HIGH severity alerts in the ledger
    pub active_alerts: usize,
    pub last_update: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn orbit_class_from_altitude() {
        assert_eq!(OrbitClass::from_altitude(550.0), OrbitClass::Leo);
        assert_eq!(OrbitClass::from_altitude(20_200.0), OrbitClass::Meo);
        assert_eq!(OrbitClass::from_altitude(35_786.0), OrbitClass::Geo);
    }

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key("B", "A"), "A-B");
        assert_eq!(pair_key("A", "B"), "A-B");
    }

    #[test]
    fn tracked_object_uses_camel_case_fields() {
        let object = TrackedObject::new("25544", 51.0, -0.1, 420.0).with_name("ISS");
        let value = serde_json::to_value(&object).unwrap();
        assert!(value.get("lastUpdated").is_some());
        assert_eq!(value["category"], "LEO");
    }

    #[test]
    fn stream_event_envelope() {
        let event = StreamEvent::AlertsAppended(AlertBatch {
            ts: Utc::now(),
            alerts: vec![Alert::new(
                AlertKind::LowAltitude,
                "SYN-004",
                Severity::Medium,
                280.0,
                "low",
                Utc::now(),
            )],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "alerts_appended");
        assert_eq!(value["data"]["alerts"][0]["kind"], "LOW_ALTITUDE");
        assert_eq!(value["data"]["alerts"][0]["id"], "LOW_ALTITUDE:SYN-004");

        let parsed: StreamEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }
}
