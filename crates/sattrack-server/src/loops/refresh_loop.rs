//! Fleet refresh loop.
//!
//! Pulls a batch from the data source, commits it to the fleet store and
//! publishes `fleet_updated`. Runs on a fixed interval and on manual
//! requests; overlapping runs are skipped.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::time::{interval_at, MissedTickBehavior};

use sattrack_sources::FleetSource;

use crate::loops::guard::RunOutcome;
use crate::state::AppState;

/// Run one refresh unless one is already in flight.
pub async fn refresh_once(state: &AppState, source: &dyn FleetSource) -> RunOutcome {
    let Some(_run) = state.refresh_guard().try_start() else {
        tracing::warn!("Refresh still running; skipping this trigger");
        return RunOutcome::Skipped;
    };

    let started = Instant::now();
    let batch = source.fetch_all().await;
    let failures = batch.failures.len();
    let synthetic = batch.is_synthetic();
    let snapshot = state.commit_fleet(&batch);

    tracing::info!(
        tracked = snapshot.objects.len(),
        synthetic,
        failures,
        "Fleet refreshed in {:?}",
        started.elapsed()
    );
    RunOutcome::Completed
}

/// Start the periodic refresh loop. The first tick fires one interval after
/// start; the initial refresh is the caller's job.
pub async fn run_refresh_loop(
    state: Arc<AppState>,
    source: Arc<dyn FleetSource>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = state.config().refresh_interval();
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "Refresh loop started (every {:?}, source: {})",
        period,
        source.describe()
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Refresh loop shutting down");
                break;
            }
            _ = ticker.tick() => {}
            _ = state.refresh_requested().notified() => {
                tracing::info!("Manual refresh requested");
            }
        }

        let state = state.clone();
        let source = source.clone();
        tokio::spawn(async move {
            refresh_once(&state, source.as_ref()).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use sattrack_core::MotionKind;
    use sattrack_sources::FleetBatch;

    use crate::config::Config;

    struct SlowSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FleetSource for SlowSource {
        async fn fetch_all(&self) -> FleetBatch {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            FleetBatch::synthetic(Utc::now(), Vec::new())
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    fn state(refresh_secs: u64) -> Arc<AppState> {
        let config = Config {
            refresh_interval_secs: refresh_secs,
            motion: MotionKind::Stationary,
            database_path: None,
            ..Config::default()
        };
        Arc::new(AppState::new(config).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refresh_is_skipped() {
        let state = state(30);
        let source = SlowSource {
            delay: Duration::from_secs(10),
            calls: AtomicUsize::new(0),
        };

        let (first, second) = tokio::join!(
            refresh_once(&state, &source),
            refresh_once(&state, &source)
        );

        assert_eq!(first, RunOutcome::Completed);
        assert_eq!(second, RunOutcome::Skipped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.fleet_snapshot().objects.len(), 8);
        assert!(!state.refresh_guard().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_never_runs_concurrently_with_itself() {
        let state = state(1);
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(2500),
            calls: AtomicUsize::new(0),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_refresh_loop(state.clone(), source.clone(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // Ticks at 1s and 4s start runs; 2s, 3s and 5s land on a running refresh.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_request_triggers_refresh() {
        let state = state(3600);
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(10),
            calls: AtomicUsize::new(0),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_refresh_loop(state.clone(), source.clone(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(state.request_refresh());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.fleet_snapshot().objects.len(), 8);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
