//! Data source adapter: providers in, one normalized fleet batch out.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;

use sattrack_core::{synthetic_fleet, TrackedObject};

use crate::normalize::merge_first_seen;
use crate::provider::{PositionProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrigin {
    /// Telemetry from at least one provider
    Providers,
    /// Generated fleet; carries no fresh telemetry
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

/// Result of one adapter fetch. Never empty.
#[derive(Debug, Clone)]
pub struct FleetBatch {
    pub origin: BatchOrigin,
    pub objects: Vec<TrackedObject>,
    pub failures: Vec<ProviderFailure>,
    pub fetched_at: DateTime<Utc>,
}

impl FleetBatch {
    pub fn live(objects: Vec<TrackedObject>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            origin: BatchOrigin::Providers,
            objects,
            failures: Vec::new(),
            fetched_at,
        }
    }

    pub fn synthetic(fetched_at: DateTime<Utc>, failures: Vec<ProviderFailure>) -> Self {
        Self {
            origin: BatchOrigin::Synthetic,
            objects: synthetic_fleet(fetched_at),
            failures,
            fetched_at,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == BatchOrigin::Synthetic
    }
}

/// Anything the refresh loop can pull a fleet from.
#[async_trait]
pub trait FleetSource: Send + Sync {
    async fn fetch_all(&self) -> FleetBatch;

    /// Human-readable description for logs and health output.
    fn describe(&self) -> String;
}

/// Fans out to the configured providers, merges them in priority order and
/// falls back to the synthetic fleet.
pub struct DataSourceAdapter {
    providers: Vec<Box<dyn PositionProvider>>,
    provider_timeout: Duration,
    force_synthetic: bool,
}

impl DataSourceAdapter {
    pub fn new(provider_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout,
            force_synthetic: false,
        }
    }

    /// Append a provider. Earlier providers win id collisions.
    pub fn with_provider(mut self, provider: Box<dyn PositionProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn force_synthetic(mut self, enabled: bool) -> Self {
        self.force_synthetic = enabled;
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    async fn fetch_one(
        &self,
        provider: &dyn PositionProvider,
    ) -> Result<Vec<crate::provider::RawPosition>, ProviderError> {
        match tokio::time::timeout(self.provider_timeout, provider.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.provider_timeout)),
        }
    }
}

#[async_trait]
impl FleetSource for DataSourceAdapter {
    async fn fetch_all(&self) -> FleetBatch {
        let now = Utc::now();
        if self.force_synthetic || self.providers.is_empty() {
            return FleetBatch::synthetic(now, Vec::new());
        }

        let results = join_all(
            self.providers
                .iter()
                .map(|provider| self.fetch_one(provider.as_ref())),
        )
        .await;

        let mut failures = Vec::new();
        let mut batches = Vec::new();
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(records) => {
                    tracing::debug!("{} returned {} records", provider.name(), records.len());
                    batches.push((provider.name().to_string(), records));
                }
                Err(err) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), err);
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let objects = merge_first_seen(batches, now);
        if objects.is_empty() {
            tracing::warn!(
                "No provider produced usable records ({} failed); using synthetic fleet",
                failures.len()
            );
            return FleetBatch::synthetic(now, failures);
        }

        FleetBatch {
            origin: BatchOrigin::Providers,
            objects,
            failures,
            fetched_at: now,
        }
    }

    fn describe(&self) -> String {
        if self.force_synthetic || self.providers.is_empty() {
            "synthetic".to_string()
        } else {
            self.provider_names().join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RawPosition;
    use sattrack_core::{SYNTHETIC_FLEET_SIZE, SYNTHETIC_SOURCE};

    enum Behavior {
        Records(Vec<RawPosition>),
        Fail,
        Hang,
    }

    struct FakeProvider {
        name: &'static str,
        behavior: Behavior,
    }

    #[async_trait]
    impl PositionProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<RawPosition>, ProviderError> {
            match &self.behavior {
                Behavior::Records(records) => Ok(records.clone()),
                Behavior::Fail => Err(ProviderError::Remote("unauthorized".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn provider(name: &'static str, behavior: Behavior) -> Box<dyn PositionProvider> {
        Box::new(FakeProvider { name, behavior })
    }

    fn ids(batch: &FleetBatch) -> Vec<String> {
        batch.objects.iter().map(|o| o.id.clone()).collect()
    }

    #[tokio::test]
    async fn no_providers_yields_synthetic_fleet() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(1));
        let batch = adapter.fetch_all().await;
        assert!(batch.is_synthetic());
        assert_eq!(batch.objects.len(), SYNTHETIC_FLEET_SIZE);
        assert_eq!(adapter.describe(), "synthetic");
    }

    #[tokio::test]
    async fn all_providers_failing_falls_back_deterministically() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(1))
            .with_provider(provider("a", Behavior::Fail))
            .with_provider(provider("b", Behavior::Fail));

        let first = adapter.fetch_all().await;
        let second = adapter.fetch_all().await;

        assert!(first.is_synthetic());
        assert_eq!(first.failures.len(), 2);
        assert_eq!(first.objects.len(), SYNTHETIC_FLEET_SIZE);
        assert_eq!(ids(&first), ids(&second));
        assert!(first.objects.iter().all(|o| o.source == SYNTHETIC_SOURCE));
    }

    #[tokio::test]
    async fn empty_results_fall_back_to_synthetic() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(1))
            .with_provider(provider("empty", Behavior::Records(Vec::new())));
        assert!(adapter.fetch_all().await.is_synthetic());
    }

    #[tokio::test]
    async fn earlier_provider_wins_and_failures_are_isolated() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(1))
            .with_provider(provider("broken", Behavior::Fail))
            .with_provider(provider(
                "primary",
                Behavior::Records(vec![RawPosition::new("A", 1.0, 1.0).with_altitude(500.0)]),
            ))
            .with_provider(provider(
                "secondary",
                Behavior::Records(vec![
                    RawPosition::new("A", 9.0, 9.0),
                    RawPosition::new("B", 2.0, 2.0),
                ]),
            ));

        let batch = adapter.fetch_all().await;
        assert_eq!(batch.origin, BatchOrigin::Providers);
        assert_eq!(ids(&batch), vec!["A", "B"]);
        assert_eq!(batch.objects[0].source, "primary");
        assert_eq!(batch.objects[0].latitude, 1.0);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].provider, "broken");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(5))
            .with_provider(provider("hung", Behavior::Hang))
            .with_provider(provider(
                "ok",
                Behavior::Records(vec![RawPosition::new("B", 2.0, 2.0)]),
            ));

        let batch = adapter.fetch_all().await;
        assert_eq!(ids(&batch), vec!["B"]);
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.failures[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn force_synthetic_skips_providers() {
        let adapter = DataSourceAdapter::new(Duration::from_secs(1))
            .with_provider(provider(
                "ok",
                Behavior::Records(vec![RawPosition::new("B", 2.0, 2.0)]),
            ))
            .force_synthetic(true);
        assert!(adapter.fetch_all().await.is_synthetic());
    }
}
