//! Outbound update channels.
//!
//! Every committed change goes through a [`Publisher`]. The WebSocket side
//! ([`BroadcastHub`]) fans out the serialized delta; the poll side
//! ([`PollCache`]) keeps the latest full snapshot envelope for
//! `GET /api/snapshot`. Both serialize the same [`StreamEvent`] type, so
//! clients parse either transport with one decoder.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use tokio::sync::broadcast;

use sattrack_core::{FullSnapshot, StreamEvent};

pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `event`. `state` is the complete state after the change.
    fn publish(&self, event: &StreamEvent, state: &FullSnapshot) -> Result<()>;
}

/// Serialized delta fan-out to connected push subscribers.
pub struct BroadcastHub {
    tx: broadcast::Sender<Arc<str>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastHub {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn publish(&self, event: &StreamEvent, _state: &FullSnapshot) -> Result<()> {
        let payload: Arc<str> = serde_json::to_string(event)?.into();
        // No receivers is not an error; nobody is listening yet.
        let _ = self.tx.send(payload);
        Ok(())
    }
}

/// Latest full snapshot envelope for pull clients.
pub struct PollCache {
    latest: RwLock<Arc<str>>,
}

impl PollCache {
    pub fn new(initial: &FullSnapshot) -> Result<Self> {
        Ok(Self {
            latest: RwLock::new(encode_snapshot(initial)?),
        })
    }

    pub fn latest(&self) -> Arc<str> {
        match self.latest.read() {
            Ok(latest) => latest.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Publisher for PollCache {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn publish(&self, _event: &StreamEvent, state: &FullSnapshot) -> Result<()> {
        let encoded = encode_snapshot(state)?;
        match self.latest.write() {
            Ok(mut latest) => *latest = encoded,
            Err(poisoned) => *poisoned.into_inner() = encoded,
        }
        Ok(())
    }
}

/// Publishes to several publishers; one failing does not stop the others.
#[derive(Default)]
pub struct Fanout {
    targets: Vec<Arc<dyn Publisher>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: Arc<dyn Publisher>) -> Self {
        self.targets.push(target);
        self
    }
}

impl Publisher for Fanout {
    fn name(&self) -> &'static str {
        "fanout"
    }

    fn publish(&self, event: &StreamEvent, state: &FullSnapshot) -> Result<()> {
        for target in &self.targets {
            if let Err(err) = target.publish(event, state) {
                tracing::warn!("Publisher {} failed: {}", target.name(), err);
            }
        }
        Ok(())
    }
}

/// `{"type":"snapshot","data":...}` as sent on connect and served on poll.
pub fn encode_snapshot(state: &FullSnapshot) -> Result<Arc<str>> {
    let event = StreamEvent::Snapshot(state.clone());
    Ok(serde_json::to_string(&event)?.into())
}
