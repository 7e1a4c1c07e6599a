//! Self-maintaining dashboard feed.
//!
//! Prefers the push stream. When it cannot connect, or the stream drops,
//! the feed polls `/api/snapshot` so the view never goes blank, and retries
//! push on a fixed schedule.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::DashboardClient;
use crate::view::DashboardView;

/// Transport state, reported separately from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    /// Receiving pushed updates
    Connected,
    /// Push unavailable; refreshing from the snapshot endpoint
    Polling,
    /// Neither transport reachable; the view holds the last known data
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    pub poll_interval: Duration,
    pub push_retry_interval: Duration,
    pub alert_capacity: usize,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            push_retry_interval: Duration::from_secs(30),
            alert_capacity: sattrack_core::DEFAULT_LEDGER_CAPACITY,
        }
    }
}

pub struct LiveFeed {
    view: watch::Receiver<DashboardView>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Start the background task on the current runtime.
    pub fn spawn(client: DashboardClient, config: LiveFeedConfig) -> Self {
        let (view_tx, view) = watch::channel(DashboardView::new(config.alert_capacity));
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);
        let task = tokio::spawn(run_feed(client, config, view_tx, status_tx));
        Self { view, status, task }
    }

    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed(
    client: DashboardClient,
    config: LiveFeedConfig,
    view: watch::Sender<DashboardView>,
    status: watch::Sender<ConnectionStatus>,
) {
    loop {
        status.send_replace(ConnectionStatus::Connecting);
        match client.connect_stream().await {
            Ok(mut stream) => {
                status.send_replace(ConnectionStatus::Connected);
                tracing::info!("Push stream connected to {}", client.base_url());
                loop {
                    match stream.next_event().await {
                        Ok(Some(event)) => {
                            view.send_modify(|current| current.apply(event));
                        }
                        Ok(None) => {
                            tracing::warn!("Push stream closed by server");
                            break;
                        }
                        Err(err) => {
                            tracing::warn!("Push stream failed: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Push stream unavailable: {}", err);
            }
        }

        poll_until(
            &client,
            &view,
            &status,
            config.poll_interval,
            Instant::now() + config.push_retry_interval,
        )
        .await;
    }
}

/// Poll the snapshot endpoint until `retry_at`, then hand back to push.
async fn poll_until(
    client: &DashboardClient,
    view: &watch::Sender<DashboardView>,
    status: &watch::Sender<ConnectionStatus>,
    poll_interval: Duration,
    retry_at: Instant,
) {
    loop {
        match client.snapshot().await {
            Ok(snapshot) => {
                view.send_modify(|current| current.replace(snapshot));
                status.send_replace(ConnectionStatus::Polling);
            }
            Err(err) => {
                tracing::debug!("Snapshot poll failed: {}", err);
                status.send_replace(ConnectionStatus::Disconnected);
            }
        }

        let next = Instant::now() + poll_interval;
        if next >= retry_at {
            tokio::time::sleep_until(retry_at).await;
            return;
        }
        tokio::time::sleep_until(next).await;
    }
}
