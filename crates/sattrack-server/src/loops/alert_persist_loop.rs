//! Alert log persistence loop.
//!
//! Collects alert batches from the proximity loop and writes them in
//! periodic transactions. Database trouble backs off and keeps the batches
//! queued; the in-memory pipeline never waits on it.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;

use sattrack_core::Alert;

use crate::backoff::Backoff;
use crate::persistence::{alerts as alerts_db, Database};

const FLUSH_SECS: u64 = 2;
const BACKOFF_MAX_SECS: u64 = 60;
/// Oldest queued alerts are dropped beyond this while the database is down.
const MAX_PENDING_ALERTS: usize = 5_000;

pub async fn run_alert_persist_loop(
    db: Database,
    mut rx: mpsc::Receiver<Vec<Alert>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(Duration::from_secs(FLUSH_SECS));
    let mut backoff = Backoff::new(
        Duration::from_secs(FLUSH_SECS),
        Duration::from_secs(BACKOFF_MAX_SECS),
    );
    let mut pending: Vec<Alert> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Alert persistence loop shutting down");
                break;
            }
            batch = rx.recv() => {
                match batch {
                    Some(batch) => {
                        pending.extend(batch);
                        while let Ok(more) = rx.try_recv() {
                            pending.extend(more);
                        }
                        cap_pending(&mut pending);
                    }
                    None => {
                        tracing::info!("Alert persistence channel closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if !backoff.ready() {
                    continue;
                }
                match flush_pending(&db, &mut pending).await {
                    Ok(0) => {}
                    Ok(written) => {
                        tracing::debug!("Persisted {} alerts", written);
                        backoff.succeed();
                    }
                    Err(err) => {
                        let delay = backoff.fail();
                        tracing::warn!(
                            "Alert log flush failed ({} consecutive): {} (backing off {:?})",
                            backoff.failures(),
                            err,
                            delay
                        );
                    }
                }
            }
        }
    }

    while let Ok(more) = rx.try_recv() {
        pending.extend(more);
    }
    if let Err(err) = flush_pending(&db, &mut pending).await {
        tracing::warn!("Alert log final flush failed: {}", err);
    }
}

fn cap_pending(pending: &mut Vec<Alert>) {
    if pending.len() > MAX_PENDING_ALERTS {
        let excess = pending.len() - MAX_PENDING_ALERTS;
        pending.drain(..excess);
        tracing::warn!("Alert log backlog full; dropped {} oldest alerts", excess);
    }
}

/// Write everything pending in one transaction. On failure the batch stays
/// queued.
async fn flush_pending(db: &Database, pending: &mut Vec<Alert>) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }

    let mut tx = db.pool().begin().await?;
    if let Err(err) = alerts_db::insert_alerts_tx(&mut tx, pending).await {
        tx.rollback().await.ok();
        return Err(err);
    }
    tx.commit().await?;

    let written = pending.len();
    pending.clear();
    Ok(written)
}
