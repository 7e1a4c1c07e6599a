//! Sattrack core - models, proximity evaluation and alert ledger.

pub mod ledger;
pub mod models;
pub mod motion;
pub mod proximity;
pub mod synthetic;

pub use ledger::{AlertLedger, DEFAULT_LEDGER_CAPACITY};
pub use models::{
    pair_key, Alert, AlertBatch, AlertKind, FleetCounts, FleetStats, FleetUpdate, FullSnapshot,
    OrbitClass, ParseLevelError, Severity, StreamEvent, TrackedObject,
};
pub use motion::{MotionKind, MotionModel, OrbitalDrift, RandomWalk, Stationary};
pub use proximity::{separation, ProximityEvaluator, ProximityRules, RulesError};
pub use synthetic::{synthetic_fleet, SYNTHETIC_FLEET_SIZE, SYNTHETIC_SOURCE};
