//! Current fleet with atomic snapshot publication.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use sattrack_core::{MotionModel, TrackedObject};
use sattrack_sources::FleetBatch;

/// Immutable view of the fleet at one commit.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    /// Ordered by id
    pub objects: Vec<TrackedObject>,
    pub updated_at: Option<DateTime<Utc>>,
    pub synthetic: bool,
}

/// Single-writer fleet store.
///
/// `replace` builds the next snapshot off to the side and swaps the `Arc`
/// under a short write lock, so readers see either the previous or the next
/// fleet and never a mix.
pub struct FleetStore {
    current: RwLock<Arc<FleetSnapshot>>,
    motion: Mutex<Box<dyn MotionModel>>,
    misses: DashMap<String, u32>,
    stale_after_cycles: u32,
}

impl FleetStore {
    pub fn new(motion: Box<dyn MotionModel>, stale_after_cycles: u32) -> Self {
        Self {
            current: RwLock::new(Arc::new(FleetSnapshot::default())),
            motion: Mutex::new(motion),
            misses: DashMap::new(),
            stale_after_cycles,
        }
    }

    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn motion_name(&self) -> &'static str {
        match self.motion.lock() {
            Ok(motion) => motion.name(),
            Err(poisoned) => poisoned.into_inner().name(),
        }
    }

    /// Merge a fetched batch and publish the result.
    ///
    /// Provider batches overwrite matching entries. Synthetic batches carry
    /// no telemetry, so every known id is advanced by the motion model
    /// instead and nothing is evicted. Objects missing from a provider batch
    /// are kept until they have been absent for `stale_after_cycles`
    /// consecutive provider refreshes.
    pub fn replace(&self, batch: &FleetBatch) -> Arc<FleetSnapshot> {
        let previous = self.snapshot();
        let prior: HashMap<&str, &TrackedObject> = previous
            .objects
            .iter()
            .map(|object| (object.id.as_str(), object))
            .collect();
        let synthetic = batch.is_synthetic();

        let mut next: Vec<TrackedObject> = Vec::with_capacity(batch.objects.len());
        let mut present: HashSet<&str> = HashSet::with_capacity(batch.objects.len());
        let mut motion = match self.motion.lock() {
            Ok(motion) => motion,
            Err(poisoned) => poisoned.into_inner(),
        };
        for incoming in &batch.objects {
            if !present.insert(incoming.id.as_str()) {
                continue;
            }
            if !synthetic {
                self.misses.remove(&incoming.id);
            }
            let object = match prior.get(incoming.id.as_str()) {
                Some(old) if synthetic => {
                    let mut advanced = advance(&mut **motion, old, batch.fetched_at);
                    advanced.name = incoming.name.clone();
                    advanced.source = incoming.source.clone();
                    advanced
                }
                _ => incoming.clone(),
            };
            next.push(object);
        }

        for old in &previous.objects {
            if present.contains(old.id.as_str()) {
                continue;
            }
            if synthetic {
                next.push(advance(&mut **motion, old, batch.fetched_at));
                continue;
            }
            if self.stale_after_cycles == 0 {
                next.push(old.clone());
                continue;
            }
            let mut misses = self.misses.entry(old.id.clone()).or_insert(0);
            *misses += 1;
            if *misses < self.stale_after_cycles {
                next.push(old.clone());
            } else {
                drop(misses);
                self.misses.remove(&old.id);
                tracing::debug!("Evicting stale object {}", old.id);
            }
        }
        drop(motion);

        next.sort_by(|a, b| a.id.cmp(&b.id));
        let snapshot = Arc::new(FleetSnapshot {
            objects: next,
            updated_at: Some(batch.fetched_at),
            synthetic,
        });

        match self.current.write() {
            Ok(mut current) => *current = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        snapshot
    }
}

fn advance(
    motion: &mut dyn MotionModel,
    object: &TrackedObject,
    at: DateTime<Utc>,
) -> TrackedObject {
    let elapsed = (at - object.last_updated).num_milliseconds().max(0) as f64 / 1000.0;
    let mut advanced = motion.advance(object, elapsed);
    advanced.last_updated = at;
    advanced.reclassify();
    advanced
}
