//! Proximity evaluation for the tracked fleet.
//!
//! Derives alerts from a fleet snapshot: pairwise separation checks plus
//! per-object altitude and velocity thresholds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{pair_key, Alert, AlertKind, Severity, TrackedObject};

/// Thresholds used by the proximity evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityRules {
    /// Separation index below which a pair alerts
    pub proximity_threshold: f64,
    /// Separation below which a pair is MEDIUM
    pub proximity_medium_below: f64,
    /// Separation below which a pair is HIGH
    pub proximity_high_below: f64,
    /// Kilometers of altitude difference per separation unit
    pub altitude_weight: f64,
    /// Altitude (km) below which LOW_ALTITUDE alerts
    pub low_altitude_km: f64,
    /// Altitude (km) below which LOW_ALTITUDE is HIGH
    pub critical_altitude_km: f64,
    /// Velocity (km/s) above which HIGH_VELOCITY alerts
    pub high_velocity_kms: f64,
    /// Velocity (km/s) above which HIGH_VELOCITY is HIGH
    pub critical_velocity_kms: f64,
}

impl Default for ProximityRules {
    fn default() -> Self {
        Self {
            proximity_threshold: 50.0,
            proximity_medium_below: 35.0,
            proximity_high_below: 20.0,
            altitude_weight: 100.0,
            low_altitude_km: 300.0,
            critical_altitude_km: 200.0,
            high_velocity_kms: 8.0,
            critical_velocity_kms: 9.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("{0} must be a finite positive number")]
    NotPositive(&'static str),
    #[error("proximity bands must satisfy high ({high}) <= medium ({medium}) <= threshold ({threshold})")]
    ProximityBands { high: f64, medium: f64, threshold: f64 },
    #[error("critical altitude ({critical}) must not exceed low altitude ({low})")]
    AltitudeBands { critical: f64, low: f64 },
    #[error("critical velocity ({critical}) must not be below high velocity ({high})")]
    VelocityBands { critical: f64, high: f64 },
}

impl ProximityRules {
    /// Default rules with a different separation threshold. The MEDIUM and
    /// HIGH bands scale with it so the default proportions hold.
    pub fn with_threshold(threshold: f64) -> Self {
        let defaults = Self::default();
        let scale = threshold / defaults.proximity_threshold;
        Self {
            proximity_threshold: threshold,
            proximity_medium_below: defaults.proximity_medium_below * scale,
            proximity_high_below: defaults.proximity_high_below * scale,
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        let positives = [
            ("proximity_threshold", self.proximity_threshold),
            ("proximity_medium_below", self.proximity_medium_below),
            ("proximity_high_below", self.proximity_high_below),
            ("altitude_weight", self.altitude_weight),
            ("low_altitude_km", self.low_altitude_km),
            ("critical_altitude_km", self.critical_altitude_km),
            ("high_velocity_kms", self.high_velocity_kms),
            ("critical_velocity_kms", self.critical_velocity_kms),
        ];
        for (name, value) in positives {
            if !value.is_finite() || value <= 0.0 {
                return Err(RulesError::NotPositive(name));
            }
        }
        if !(self.proximity_high_below <= self.proximity_medium_below
            && self.proximity_medium_below <= self.proximity_threshold)
        {
            return Err(RulesError::ProximityBands {
                high: self.proximity_high_below,
                medium: self.proximity_medium_below,
                threshold: self.proximity_threshold,
            });
        }
        if self.critical_altitude_km > self.low_altitude_km {
            return Err(RulesError::AltitudeBands {
                critical: self.critical_altitude_km,
                low: self.low_altitude_km,
            });
        }
        if self.critical_velocity_kms < self.high_velocity_kms {
            return Err(RulesError::VelocityBands {
                critical: self.critical_velocity_kms,
                high: self.high_velocity_kms,
            });
        }
        Ok(())
    }
}

/// Separation index between two objects.
///
/// This is a display heuristic, not a geodesic or physical distance: it
/// mixes degrees of latitude/longitude with kilometers of altitude scaled
/// down by `altitude_weight`. Longitude is not wrapped at the antimeridian.
pub fn separation(a: &TrackedObject, b: &TrackedObject, altitude_weight: f64) -> f64 {
    let d_lat = a.latitude - b.latitude;
    let d_lon = a.longitude - b.longitude;
    let d_alt = (a.altitude - b.altitude) / altitude_weight;
    (d_lat.powi(2) + d_lon.powi(2) + d_alt.powi(2)).sqrt()
}

/// Pure snapshot → alerts evaluator.
///
/// Scans every unordered pair, so a pass is O(n²). That is fine for fleets of
/// tens to low hundreds of objects; larger fleets need a spatial index.
#[derive(Debug, Clone, Default)]
pub struct ProximityEvaluator {
    rules: ProximityRules,
}

impl ProximityEvaluator {
    pub fn new(rules: ProximityRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ProximityRules {
        &self.rules
    }

    pub fn classify_separation(&self, distance: f64) -> Option<Severity> {
        if distance.is_nan() || distance >= self.rules.proximity_threshold {
            return None;
        }
        if distance < self.rules.proximity_high_below {
            Some(Severity::High)
        } else if distance < self.rules.proximity_medium_below {
            Some(Severity::Medium)
        } else {
            Some(Severity::Low)
        }
    }

    pub fn classify_altitude(&self, altitude_km: f64) -> Option<Severity> {
        if altitude_km.is_nan() || altitude_km >= self.rules.low_altitude_km {
            return None;
        }
        if altitude_km < self.rules.critical_altitude_km {
            Some(Severity::High)
        } else {
            Some(Severity::Medium)
        }
    }

    pub fn classify_velocity(&self, velocity_kms: f64) -> Option<Severity> {
        if velocity_kms.is_nan() || velocity_kms <= self.rules.high_velocity_kms {
            return None;
        }
        if velocity_kms > self.rules.critical_velocity_kms {
            Some(Severity::High)
        } else {
            Some(Severity::Medium)
        }
    }

    /// Evaluate a snapshot. Deterministic for a given snapshot and `at`.
    pub fn evaluate(&self, objects: &[TrackedObject], at: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                let distance = separation(a, b, self.rules.altitude_weight);
                let Some(severity) = self.classify_separation(distance) else {
                    continue;
                };
                alerts.push(Alert::new(
                    AlertKind::Proximity,
                    pair_key(&a.id, &b.id),
                    severity,
                    distance,
                    format!(
                        "{} and {} within separation {:.3} (threshold {})",
                        a.name, b.name, distance, self.rules.proximity_threshold
                    ),
                    at,
                ));
            }
        }

        for object in objects {
            if let Some(severity) = self.classify_altitude(object.altitude) {
                alerts.push(Alert::new(
                    AlertKind::LowAltitude,
                    object.id.clone(),
                    severity,
                    object.altitude,
                    format!("{} at {:.1} km altitude", object.name, object.altitude),
                    at,
                ));
            }
            if let Some(severity) = self.classify_velocity(object.velocity) {
                alerts.push(Alert::new(
                    AlertKind::HighVelocity,
                    object.id.clone(),
                    severity,
                    object.velocity,
                    format!("{} moving at {:.2} km/s", object.name, object.velocity),
                    at,
                ));
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn object(id: &str, lat: f64, lon: f64, alt: f64, velocity: f64) -> TrackedObject {
        TrackedObject::new(id, lat, lon, alt)
            .with_velocity(velocity)
            .observed_at(at())
    }

    fn pair_at_separation(distance: f64) -> Vec<TrackedObject> {
        vec![
            object("A", 0.0, 0.0, 500.0, 7.5),
            object("B", 0.0, distance, 500.0, 7.5),
        ]
    }

    #[test]
    fn test_separation_down_weights_altitude() {
        let a = object("A", 0.0, 0.0, 500.0, 7.5);
        let b = object("B", 3.0, 4.0, 500.0, 7.5);
        assert_eq!(separation(&a, &b, 100.0), 5.0);

        let c = object("C", 0.0, 0.0, 1_500.0, 7.5);
        assert_eq!(separation(&a, &c, 100.0), 10.0);
    }

    #[test]
    fn test_proximity_threshold_boundary() {
        let evaluator = ProximityEvaluator::default();

        let alerts = evaluator.evaluate(&pair_at_separation(49.999), at());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Proximity);
        assert_eq!(alerts[0].severity, Severity::Low);
        assert_eq!(alerts[0].subject_id, "A-B");

        assert!(evaluator.evaluate(&pair_at_separation(50.0), at()).is_empty());
        assert!(evaluator.evaluate(&pair_at_separation(72.0), at()).is_empty());
    }

    #[test]
    fn test_proximity_severity_bands() {
        let evaluator = ProximityEvaluator::default();
        let severity = |d: f64| evaluator.evaluate(&pair_at_separation(d), at())[0].severity;

        assert_eq!(severity(19.999), Severity::High);
        assert_eq!(severity(20.0), Severity::Medium);
        assert_eq!(severity(34.999), Severity::Medium);
        assert_eq!(severity(35.0), Severity::Low);
    }

    #[test]
    fn test_altitude_and_velocity_thresholds() {
        let evaluator = ProximityEvaluator::default();
        assert_eq!(evaluator.classify_altitude(300.0), None);
        assert_eq!(evaluator.classify_altitude(299.9), Some(Severity::Medium));
        assert_eq!(evaluator.classify_altitude(200.0), Some(Severity::Medium));
        assert_eq!(evaluator.classify_altitude(199.9), Some(Severity::High));

        assert_eq!(evaluator.classify_velocity(8.0), None);
        assert_eq!(evaluator.classify_velocity(8.1), Some(Severity::Medium));
        assert_eq!(evaluator.classify_velocity(9.0), Some(Severity::Medium));
        assert_eq!(evaluator.classify_velocity(9.5), Some(Severity::High));
    }

    #[test]
    fn test_four_object_scenario() {
        let evaluator = ProximityEvaluator::default();
        let snapshot = vec![
            object("SAT-1", 0.0, 0.0, 400.0, 7.6),
            object("SAT-2", 0.0, 0.0001, 400.0, 7.6),
            object("SAT-3", 60.0, 100.0, 150.0, 7.6),
            object("SAT-4", -60.0, -100.0, 400.0, 9.5),
        ];

        let alerts = evaluator.evaluate(&snapshot, at());
        assert_eq!(alerts.len(), 3);

        let find = |kind: AlertKind| alerts.iter().find(|a| a.kind == kind).unwrap();
        let proximity = find(AlertKind::Proximity);
        assert_eq!(proximity.subject_id, "SAT-1-SAT-2");
        assert_eq!(proximity.severity, Severity::High);

        let low = find(AlertKind::LowAltitude);
        assert_eq!(low.subject_id, "SAT-3");
        assert_eq!(low.severity, Severity::High);

        let fast = find(AlertKind::HighVelocity);
        assert_eq!(fast.subject_id, "SAT-4");
        assert_eq!(fast.severity, Severity::High);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let evaluator = ProximityEvaluator::default();
        let snapshot = crate::synthetic::synthetic_fleet(at());

        let first = evaluator.evaluate(&snapshot, at());
        let second = evaluator.evaluate(&snapshot, at());
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rules_validation() {
        assert!(ProximityRules::default().validate().is_ok());

        let rules = ProximityRules {
            proximity_threshold: 30.0,
            ..ProximityRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(RulesError::ProximityBands { .. })
        ));

        let rules = ProximityRules {
            altitude_weight: 0.0,
            ..ProximityRules::default()
        };
        assert_eq!(
            rules.validate(),
            Err(RulesError::NotPositive("altitude_weight"))
        );
    }
}
