//! Shared server state.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use sattrack_core::{
    Alert, AlertBatch, AlertLedger, FleetCounts, FleetStats, FleetUpdate, FullSnapshot,
    ProximityEvaluator, Severity, StreamEvent,
};
use sattrack_sources::{FleetBatch, N2yoClient, ProviderFailure};

use crate::config::Config;
use crate::loops::guard::TaskGuard;
use crate::persistence::Database;
use crate::state::fleet::{FleetSnapshot, FleetStore};
use crate::stream::{BroadcastHub, Fanout, PollCache, Publisher};

/// Outcome of the most recent refresh, for health reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStatus {
    pub synthetic: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_provider_error: Option<String>,
    pub failures: Vec<ProviderFailure>,
}

#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub connected_at: DateTime<Utc>,
    pub resyncs: u32,
}

/// A push subscriber's starting point: the full state at subscribe time and
/// every delta committed after it.
pub struct Subscription {
    pub id: Uuid,
    pub initial: Arc<str>,
    pub updates: broadcast::Receiver<Arc<str>>,
}

pub struct AppState {
    config: Config,
    fleet: FleetStore,
    ledger: Mutex<AlertLedger>,
    evaluator: ProximityEvaluator,
    /// Serializes commit + publish against subscriber capture.
    commit_lock: Mutex<()>,
    hub: Arc<BroadcastHub>,
    poll: Arc<PollCache>,
    publisher: Arc<dyn Publisher>,
    subscribers: DashMap<Uuid, SubscriberInfo>,
    refresh_guard: TaskGuard,
    proximity_guard: TaskGuard,
    refresh_requested: Notify,
    source_status: Mutex<SourceStatus>,
    database: Option<Database>,
    n2yo: Option<N2yoClient>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        config.rules.validate()?;

        let mut ledger = AlertLedger::new(config.alert_capacity);
        if config.alert_suppress_secs > 0 {
            ledger = ledger.with_suppression(chrono::Duration::seconds(
                config.alert_suppress_secs as i64,
            ));
        }

        let initial = FullSnapshot {
            ts: Utc::now(),
            objects: Vec::new(),
            alerts: Vec::new(),
            counts: FleetCounts::default(),
        };
        let hub = Arc::new(BroadcastHub::new(config.broadcast_capacity));
        let poll = Arc::new(PollCache::new(&initial)?);
        let publisher: Arc<dyn Publisher> =
            Arc::new(Fanout::new().with(hub.clone()).with(poll.clone()));

        Ok(Self {
            fleet: FleetStore::new(config.motion.build(), config.stale_after_cycles),
            ledger: Mutex::new(ledger),
            evaluator: ProximityEvaluator::new(config.rules.clone()),
            commit_lock: Mutex::new(()),
            hub,
            poll,
            publisher,
            subscribers: DashMap::new(),
            refresh_guard: TaskGuard::new(),
            proximity_guard: TaskGuard::new(),
            refresh_requested: Notify::new(),
            source_status: Mutex::new(SourceStatus::default()),
            database: None,
            n2yo: None,
            config,
        })
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_n2yo(mut self, client: N2yoClient) -> Self {
        self.n2yo = Some(client);
        self
    }

    /// N2YO client for diagnostics; `None` while synthetic data is forced.
    pub fn n2yo(&self) -> Option<&N2yoClient> {
        if self.config.use_synthetic {
            return None;
        }
        self.n2yo.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn evaluator(&self) -> &ProximityEvaluator {
        &self.evaluator
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn motion_name(&self) -> &'static str {
        self.fleet.motion_name()
    }

    pub fn fleet_snapshot(&self) -> Arc<FleetSnapshot> {
        self.fleet.snapshot()
    }

    /// Ledger contents, newest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        lock(&self.ledger).recent()
    }

    pub fn stats(&self) -> FleetStats {
        let snapshot = self.fleet.snapshot();
        FleetStats {
            total_tracked: snapshot.objects.len(),
            active_alerts: lock(&self.ledger).count_by_severity(Severity::High),
            last_update: snapshot.updated_at,
        }
    }

    /// Serialized `snapshot` envelope of the last committed state.
    pub fn snapshot_payload(&self) -> Arc<str> {
        self.poll.latest()
    }

    /// Merge a fetched batch into the fleet and publish `fleet_updated`.
    pub fn commit_fleet(&self, batch: &FleetBatch) -> Arc<FleetSnapshot> {
        let _commit = lock(&self.commit_lock);
        let snapshot = self.fleet.replace(batch);
        self.record_source(batch);

        let ledger = lock(&self.ledger);
        let counts = FleetCounts::tally(&snapshot.objects, ledger.len());
        let state = FullSnapshot {
            ts: batch.fetched_at,
            objects: snapshot.objects.clone(),
            alerts: ledger.recent(),
            counts,
        };
        drop(ledger);

        let event = StreamEvent::FleetUpdated(FleetUpdate {
            ts: batch.fetched_at,
            objects: snapshot.objects.clone(),
            counts,
        });
        self.publish(&event, &state);
        snapshot
    }

    /// Append alerts to the ledger and publish the ones actually inserted.
    pub fn commit_alerts(&self, alerts: Vec<Alert>, at: DateTime<Utc>) -> Vec<Alert> {
        let _commit = lock(&self.commit_lock);
        let mut ledger = lock(&self.ledger);
        let inserted = ledger.append(alerts);
        if inserted.is_empty() {
            return inserted;
        }

        let snapshot = self.fleet.snapshot();
        let state = FullSnapshot {
            ts: at,
            objects: snapshot.objects.clone(),
            alerts: ledger.recent(),
            counts: FleetCounts::tally(&snapshot.objects, ledger.len()),
        };
        drop(ledger);

        let event = StreamEvent::AlertsAppended(AlertBatch {
            ts: at,
            alerts: inserted.clone(),
        });
        self.publish(&event, &state);
        inserted
    }

    fn publish(&self, event: &StreamEvent, state: &FullSnapshot) {
        if let Err(err) = self.publisher.publish(event, state) {
            tracing::warn!("Publish failed: {}", err);
        }
    }

    fn record_source(&self, batch: &FleetBatch) {
        let mut status = lock(&self.source_status);
        status.synthetic = batch.is_synthetic();
        status.last_refresh = Some(batch.fetched_at);
        if let Some(failure) = batch.failures.last() {
            status.last_provider_error = Some(format!("{}: {}", failure.provider, failure.error));
        }
        status.failures = batch.failures.clone();
    }

    pub fn source_status(&self) -> SourceStatus {
        lock(&self.source_status).clone()
    }

    /// Register a push subscriber.
    ///
    /// Capture and subscription happen under the commit lock, so nothing
    /// committed between the two is lost or duplicated.
    pub fn open_subscription(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (initial, updates) = self.capture_and_subscribe();
        self.subscribers.insert(
            id,
            SubscriberInfo {
                connected_at: Utc::now(),
                resyncs: 0,
            },
        );
        tracing::info!(subscriber = %id, "Subscriber connected ({} total)", self.subscribers.len());
        Subscription {
            id,
            initial,
            updates,
        }
    }

    /// Fresh full state and receiver for a subscriber that fell behind.
    pub fn resync(&self, id: Uuid) -> (Arc<str>, broadcast::Receiver<Arc<str>>) {
        if let Some(mut info) = self.subscribers.get_mut(&id) {
            info.resyncs += 1;
        }
        self.capture_and_subscribe()
    }

    fn capture_and_subscribe(&self) -> (Arc<str>, broadcast::Receiver<Arc<str>>) {
        let _commit = lock(&self.commit_lock);
        (self.poll.latest(), self.hub.subscribe())
    }

    pub fn close_subscription(&self, id: Uuid) {
        if let Some((_, info)) = self.subscribers.remove(&id) {
            let connected = Utc::now() - info.connected_at;
            tracing::info!(
                subscriber = %id,
                "Subscriber disconnected after {}s ({} resyncs)",
                connected.num_seconds(),
                info.resyncs
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn refresh_guard(&self) -> &TaskGuard {
        &self.refresh_guard
    }

    pub fn proximity_guard(&self) -> &TaskGuard {
        &self.proximity_guard
    }

    /// Queue a manual refresh. Returns false when one is already running.
    pub fn request_refresh(&self) -> bool {
        if self.refresh_guard.is_running() {
            return false;
        }
        self.refresh_requested.notify_one();
        true
    }

    pub fn refresh_requested(&self) -> &Notify {
        &self.refresh_requested
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
