//! Proximity evaluation loop.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};

use sattrack_core::Alert;

use crate::loops::guard::RunOutcome;
use crate::state::AppState;

/// Evaluate the current fleet once and append the result to the ledger.
///
/// Newly inserted alerts are forwarded to the alert log when `persist` is
/// set. A full persistence queue drops the batch rather than stalling
/// evaluation.
pub async fn evaluate_once(
    state: &AppState,
    persist: Option<&mpsc::Sender<Vec<Alert>>>,
) -> RunOutcome {
    let Some(_run) = state.proximity_guard().try_start() else {
        tracing::warn!("Proximity pass still running; skipping this tick");
        return RunOutcome::Skipped;
    };

    let snapshot = state.fleet_snapshot();
    let now = Utc::now();
    let alerts = state.evaluator().evaluate(&snapshot.objects, now);
    let produced = alerts.len();
    let inserted = state.commit_alerts(alerts, now);

    if produced > 0 {
        tracing::info!(
            "Proximity pass over {} objects: {} alerts, {} inserted",
            snapshot.objects.len(),
            produced,
            inserted.len()
        );
    } else {
        tracing::debug!("Proximity pass over {} objects: clear", snapshot.objects.len());
    }

    if let (Some(tx), false) = (persist, inserted.is_empty()) {
        match tx.try_send(inserted) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(batch)) => {
                tracing::warn!("Alert log queue full; dropping {} alerts", batch.len());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Alert log queue closed");
            }
        }
    }

    RunOutcome::Completed
}

/// Start the proximity loop. The first pass runs immediately.
pub async fn run_proximity_loop(
    state: Arc<AppState>,
    persist: Option<mpsc::Sender<Vec<Alert>>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = state.config().proximity_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!("Proximity loop started (every {:?})", period);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Proximity loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let state = state.clone();
                let persist = persist.clone();
                tokio::spawn(async move {
                    evaluate_once(&state, persist.as_ref()).await;
                });
            }
        }
    }
}
