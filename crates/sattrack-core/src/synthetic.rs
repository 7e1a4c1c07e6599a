//! Deterministic synthetic fleet used when no provider yields data.

use chrono::{DateTime, Utc};

use crate::models::TrackedObject;

/// Provenance tag for generated objects.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// Number of objects in the synthetic fleet.
pub const SYNTHETIC_FLEET_SIZE: usize = 8;

// id, name, latitude, longitude, altitude km, velocity km/s
const CATALOG: [(&str, &str, f64, f64, f64, f64); SYNTHETIC_FLEET_SIZE] = [
    ("SYN-001", "SYNTH-ALPHA", 12.0, -45.0, 550.0, 7.6),
    ("SYN-002", "SYNTH-BRAVO", 14.0, -40.0, 560.0, 7.6),
    ("SYN-003", "SYNTH-CHARLIE", -30.0, 60.0, 780.0, 7.5),
    ("SYN-004", "SYNTH-DELTA", 45.0, 120.0, 280.0, 7.7),
    ("SYN-005", "SYNTH-ECHO", -55.0, -150.0, 1_200.0, 7.2),
    ("SYN-006", "SYNTH-FOXTROT", 5.0, 170.0, 420.0, 8.4),
    ("SYN-007", "SYNTH-GOLF", 60.0, -100.0, 1_600.0, 7.0),
    ("SYN-008", "SYNTH-HOTEL", -10.0, 10.0, 900.0, 7.4),
];

/// Build the synthetic fleet. Ids, names and base positions never change
/// between calls or restarts; only `last_updated` follows `at`.
pub fn synthetic_fleet(at: DateTime<Utc>) -> Vec<TrackedObject> {
    CATALOG
        .iter()
        .map(|&(id, name, latitude, longitude, altitude, velocity)| {
            TrackedObject::new(id, latitude, longitude, altitude)
                .with_name(name)
                .with_velocity(velocity)
                .with_source(SYNTHETIC_SOURCE)
                .observed_at(at)
        })
        .collect()
}
