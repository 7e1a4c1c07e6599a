//! Motion models used when a batch carries no fresh telemetry.
//!
//! These stand in for orbital propagation. They are synthetic: good enough to
//! make a demo fleet move, not physically meaningful.

use std::f64::consts::PI;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::TrackedObject;

/// Altitude bounds (km) enforced by the random walk.
pub const MIN_WALK_ALTITUDE_KM: f64 = 200.0;
pub const MAX_WALK_ALTITUDE_KM: f64 = 2_000.0;

const GEO_DEG_PER_SEC: f64 = 360.0 / (24.0 * 3600.0);
const LEO_PERIOD_SECS: f64 = 95.0 * 60.0;
const LEO_DEG_PER_SEC: f64 = 360.0 / LEO_PERIOD_SECS;
const LEO_MAX_LATITUDE: f64 = 30.0;

/// Pluggable position-update strategy.
pub trait MotionModel: Send {
    fn name(&self) -> &'static str;

    /// Produce the next state of `previous` after `elapsed_secs`.
    /// Identity fields (`id`, `name`, `source`) must be preserved.
    fn advance(&mut self, previous: &TrackedObject, elapsed_secs: f64) -> TrackedObject;
}

/// Leaves positions untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stationary;

impl MotionModel for Stationary {
    fn name(&self) -> &'static str {
        "stationary"
    }

    fn advance(&mut self, previous: &TrackedObject, _elapsed_secs: f64) -> TrackedObject {
        previous.clone()
    }
}

/// Bounded random walk on latitude, longitude and altitude.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    rng: StdRng,
    max_step_deg: f64,
    max_step_km: f64,
}

impl RandomWalk {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Reproducible walk for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            max_step_deg: 0.5,
            max_step_km: 5.0,
        }
    }

    pub fn with_steps(mut self, max_step_deg: f64, max_step_km: f64) -> Self {
        self.max_step_deg = max_step_deg.abs();
        self.max_step_km = max_step_km.abs();
        self
    }

    fn step(&mut self, bound: f64) -> f64 {
        if bound == 0.0 {
            return 0.0;
        }
        self.rng.random_range(-bound..=bound)
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionModel for RandomWalk {
    fn name(&self) -> &'static str {
        "random_walk"
    }

    fn advance(&mut self, previous: &TrackedObject, _elapsed_secs: f64) -> TrackedObject {
        let mut next = previous.clone();
        next.latitude = (previous.latitude + self.step(self.max_step_deg)).clamp(-90.0, 90.0);
        next.longitude = (previous.longitude + self.step(self.max_step_deg)).clamp(-180.0, 180.0);
        next.altitude = (previous.altitude + self.step(self.max_step_km))
            .clamp(MIN_WALK_ALTITUDE_KM, MAX_WALK_ALTITUDE_KM);
        next.reclassify();
        next
    }
}

/// Constant-rate eastward drift: geosynchronous objects at one revolution per
/// day on the equator, everything else at a ~95 minute period with a
/// latitude oscillation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitalDrift;

impl MotionModel for OrbitalDrift {
    fn name(&self) -> &'static str {
        "orbital"
    }

    fn advance(&mut self, previous: &TrackedObject, elapsed_secs: f64) -> TrackedObject {
        let dt = elapsed_secs.max(0.0);
        let mut next = previous.clone();
        if previous.category == crate::models::OrbitClass::Geo {
            next.longitude = wrap_longitude(previous.longitude + GEO_DEG_PER_SEC * dt);
            next.latitude = 0.0;
        } else {
            next.longitude = wrap_longitude(previous.longitude + LEO_DEG_PER_SEC * dt);
            let epoch_secs = previous.last_updated.timestamp() as f64 + dt;
            let phase = epoch_secs.rem_euclid(LEO_PERIOD_SECS) / LEO_PERIOD_SECS;
            next.latitude = LEO_MAX_LATITUDE * (2.0 * PI * phase).sin();
        }
        next
    }
}

/// Wrap a longitude into [-180, 180).
pub fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

/// Motion model selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    RandomWalk,
    Orbital,
    Stationary,
}

impl MotionKind {
    pub fn build(self) -> Box<dyn MotionModel> {
        match self {
            Self::RandomWalk => Box::new(RandomWalk::new()),
            Self::Orbital => Box::new(OrbitalDrift),
            Self::Stationary => Box::new(Stationary),
        }
    }
}

impl FromStr for MotionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "random_walk" | "random-walk" | "walk" => Ok(Self::RandomWalk),
            "orbital" | "orbit" | "drift" => Ok(Self::Orbital),
            "stationary" | "none" | "off" => Ok(Self::Stationary),
            other => Err(format!("unknown motion model: {}", other)),
        }
    }
}
