//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use sattrack_core::{MotionKind, ProximityRules, DEFAULT_LEDGER_CAPACITY};
use sattrack_sources::n2yo::DEFAULT_BASE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Seconds between fleet refreshes
    pub refresh_interval_secs: u64,
    /// Seconds between proximity passes
    pub proximity_interval_secs: u64,
    pub rules: ProximityRules,
    pub alert_capacity: usize,
    /// Duplicate alert suppression window; 0 disables suppression
    pub alert_suppress_secs: u64,
    /// Ignore providers and serve the synthetic fleet
    pub use_synthetic: bool,
    pub n2yo_api_key: Option<String>,
    pub n2yo_base_url: String,
    pub feed_urls: Vec<String>,
    pub provider_timeout_secs: u64,
    /// Consecutive missed provider refreshes before an object is evicted; 0 never evicts
    pub stale_after_cycles: u32,
    pub motion: MotionKind,
    /// SQLite alert log path; `None` disables persistence
    pub database_path: Option<String>,
    pub database_max_connections: u32,
    pub broadcast_capacity: usize,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8000,
            refresh_interval_secs: 30,
            proximity_interval_secs: 60,
            rules: ProximityRules::default(),
            alert_capacity: DEFAULT_LEDGER_CAPACITY,
            alert_suppress_secs: 0,
            use_synthetic: false,
            n2yo_api_key: None,
            n2yo_base_url: DEFAULT_BASE_URL.to_string(),
            feed_urls: Vec::new(),
            provider_timeout_secs: 10,
            stale_after_cycles: 3,
            motion: MotionKind::RandomWalk,
            database_path: Some("data/sattrack.db".to_string()),
            database_max_connections: 4,
            broadcast_capacity: 256,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut rules = proximity_bands(
            env_opt("SATTRACK_PROXIMITY_THRESHOLD"),
            env_opt("SATTRACK_PROXIMITY_MEDIUM_BELOW"),
            env_opt("SATTRACK_PROXIMITY_HIGH_BELOW"),
        );
        rules.low_altitude_km = env_parse("SATTRACK_LOW_ALTITUDE_KM", rules.low_altitude_km);
        rules.critical_altitude_km =
            env_parse("SATTRACK_CRITICAL_ALTITUDE_KM", rules.critical_altitude_km);
        rules.high_velocity_kms = env_parse("SATTRACK_HIGH_VELOCITY_KMS", rules.high_velocity_kms);
        rules.critical_velocity_kms =
            env_parse("SATTRACK_CRITICAL_VELOCITY_KMS", rules.critical_velocity_kms);

        let database_path = match env::var("SATTRACK_DATABASE_PATH") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().to_string()),
            Err(_) => defaults.database_path.clone(),
        };

        let motion = match env::var("SATTRACK_MOTION") {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("{}; falling back to random_walk", err);
                MotionKind::RandomWalk
            }),
            Err(_) => defaults.motion,
        };

        Self {
            server_port: env_parse("SATTRACK_PORT", defaults.server_port),
            refresh_interval_secs: env_parse("SATTRACK_REFRESH_SECS", defaults.refresh_interval_secs)
                .max(1),
            proximity_interval_secs: env_parse(
                "SATTRACK_PROXIMITY_SECS",
                defaults.proximity_interval_secs,
            )
            .max(1),
            rules,
            alert_capacity: env_parse("SATTRACK_ALERT_CAPACITY", defaults.alert_capacity).max(1),
            alert_suppress_secs: env_parse(
                "SATTRACK_ALERT_SUPPRESS_SECS",
                defaults.alert_suppress_secs,
            ),
            use_synthetic: env_flag("SATTRACK_USE_SYNTHETIC") || env_flag("DEMO_MODE"),
            n2yo_api_key: env::var("N2YO_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            n2yo_base_url: env::var("N2YO_BASE_URL").unwrap_or(defaults.n2yo_base_url),
            feed_urls: env::var("SATTRACK_FEED_URLS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|url| url.trim().to_string())
                        .filter(|url| !url.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            provider_timeout_secs: env_parse(
                "SATTRACK_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )
            .max(1),
            stale_after_cycles: env_parse(
                "SATTRACK_STALE_AFTER_CYCLES",
                defaults.stale_after_cycles,
            ),
            motion,
            database_path,
            database_max_connections: env_parse(
                "SATTRACK_DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )
            .max(1),
            broadcast_capacity: env_parse(
                "SATTRACK_BROADCAST_CAPACITY",
                defaults.broadcast_capacity,
            )
            .max(16),
            log_json: env_flag("SATTRACK_LOG_JSON"),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn proximity_interval(&self) -> Duration {
        Duration::from_secs(self.proximity_interval_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// Separation threshold and severity bands.
///
/// Unset bands follow the threshold. Bands above the threshold are clamped
/// down to it so a lowered threshold never leaves the rules unusable.
fn proximity_bands(
    threshold: Option<f64>,
    medium_below: Option<f64>,
    high_below: Option<f64>,
) -> ProximityRules {
    let mut rules = match threshold {
        Some(threshold) => ProximityRules::with_threshold(threshold),
        None => ProximityRules::default(),
    };
    if let Some(medium_below) = medium_below {
        rules.proximity_medium_below = medium_below;
    }
    if let Some(high_below) = high_below {
        rules.proximity_high_below = high_below;
    }

    if rules.proximity_medium_below > rules.proximity_threshold {
        tracing::warn!(
            "MEDIUM band {} exceeds proximity threshold {}; clamping",
            rules.proximity_medium_below,
            rules.proximity_threshold
        );
        rules.proximity_medium_below = rules.proximity_threshold;
    }
    if rules.proximity_high_below > rules.proximity_medium_below {
        tracing::warn!(
            "HIGH band {} exceeds MEDIUM band {}; clamping",
            rules.proximity_high_below,
            rules.proximity_medium_below
        );
        rules.proximity_high_below = rules.proximity_medium_below;
    }
    rules
}

fn env_opt<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use sattrack_core::Severity;

    #[test]
    fn lowered_threshold_scales_bands_and_starts() {
        let config = Config {
            rules: proximity_bands(Some(25.0), None, None),
            database_path: None,
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        let evaluator = state.evaluator();

        assert_eq!(evaluator.rules().proximity_threshold, 25.0);
        assert_eq!(evaluator.classify_separation(24.0), Some(Severity::Low));
        assert_eq!(evaluator.classify_separation(15.0), Some(Severity::Medium));
        assert_eq!(evaluator.classify_separation(5.0), Some(Severity::High));
        assert_eq!(evaluator.classify_separation(25.0), None);
    }

    #[test]
    fn explicit_bands_above_threshold_are_clamped() {
        let rules = proximity_bands(Some(25.0), Some(35.0), Some(30.0));
        assert_eq!(rules.proximity_medium_below, 25.0);
        assert_eq!(rules.proximity_high_below, 25.0);
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn unset_threshold_keeps_defaults() {
        assert_eq!(proximity_bands(None, None, None), ProximityRules::default());
        let rules = proximity_bands(None, Some(40.0), None);
        assert_eq!(rules.proximity_medium_below, 40.0);
        assert_eq!(rules.proximity_high_below, 20.0);
    }
}
