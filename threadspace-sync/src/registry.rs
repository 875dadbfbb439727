//! Live-instance registry.
//!
//! All map mutations (register, unregister, heartbeat, broadcast target
//! selection, sweep) happen under one lock. Peer delivery and snapshot writes
//! happen after the lock is released: broadcast collects the target queues
//! under the lock and feeds them afterwards, and snapshot records go to the
//! `SnapshotWriter` thread.
//!
//! Every registration gets a fresh generation. Instance-side calls carry a
//! [`Registration`] and are ignored once that generation is no longer the live
//! one, so an evicted instance can never touch its successor's entry.
//!
//! Lock order is instance state, then registry map, then notification hub.
//! The registry never takes an instance's state lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use parking_lot::Mutex;

use threadspace_core::snapshot::Snapshot;
use threadspace_core::{NotificationHub, SnapshotWriter, SyncConfig, SyncEvent};
use threadspace_types::{InstanceId, InstanceState};

use crate::handle::{DeliveryTarget, InstanceHandle};
use crate::{PeriodicTask, StateUpdate, SyncError};

/// One particular registration of an id, returned by
/// [`SyncRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
    id: InstanceId,
    generation: u64,
}

impl Registration {
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SyncRegistry {
    config: SyncConfig,
    instances: Mutex<HashMap<InstanceId, InstanceHandle>>,
    next_generation: AtomicU64,
    hub: NotificationHub,
    snapshots: SnapshotWriter,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl SyncRegistry {
    /// A registry without a background sweep. Call [`sweep`](Self::sweep)
    /// yourself or use [`start`](Self::start).
    pub fn new(config: SyncConfig, hub: NotificationHub, snapshots: SnapshotWriter) -> Self {
        Self {
            config,
            instances: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            hub,
            snapshots,
            sweeper: Mutex::new(None),
        }
    }

    /// A shared registry with its liveness sweep running every
    /// `config.sweep_interval()`.
    pub fn start(
        config: SyncConfig,
        hub: NotificationHub,
        snapshots: SnapshotWriter,
    ) -> Result<Arc<Self>, SyncError> {
        let registry = Arc::new(Self::new(config, hub, snapshots));
        registry.start_sweeper()?;
        Ok(registry)
    }

    /// Start the background sweep if it is not already running.
    pub fn start_sweeper(self: &Arc<Self>) -> Result<(), SyncError> {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|task| task.is_running()) {
            return Ok(());
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = PeriodicTask::spawn("sync-sweep", self.config.sweep_interval(), move || {
            match weak.upgrade() {
                Some(registry) => {
                    registry.sweep();
                    true
                }
                None => false,
            }
        })
        .map_err(|e| SyncError::spawn("sync-sweep", e))?;
        *sweeper = Some(task);
        Ok(())
    }

    /// Stop the background sweep. Registered instances stay registered.
    pub fn shutdown(&self) {
        let task = self.sweeper.lock().take();
        if let Some(mut task) = task {
            task.stop();
            info!(target: "sync", "sweep stopped");
        }
    }

    /// Insert or replace the handle for `handle.id()`. The heartbeat clock
    /// starts fresh either way, and any earlier [`Registration`] for the id
    /// stops being current.
    pub fn register(&self, mut handle: InstanceHandle) -> Registration {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        handle.set_generation(generation);
        handle.touch(Instant::now());
        let id = handle.id().clone();
        let replaced = {
            let mut instances = self.instances.lock();
            let replaced = instances.insert(id.clone(), handle);
            self.hub
                .publish(SyncEvent::InstancesChanged(sorted_ids(&instances)));
            if replaced.is_some() {
                info!(target: "sync", "instance {} re-registered ({} live)", id, instances.len());
            } else {
                info!(target: "sync", "instance {} registered ({} live)", id, instances.len());
            }
            replaced
        };
        drop(replaced);
        Registration { id, generation }
    }

    /// Remove `id`. Returns false (and notifies nobody) if it was not live.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut instances = self.instances.lock();
            let removed = instances.remove(id);
            if removed.is_some() {
                self.hub
                    .publish(SyncEvent::InstancesChanged(sorted_ids(&instances)));
                info!(target: "sync", "instance {} unregistered ({} live)", id, instances.len());
            }
            removed
        };
        removed.is_some()
    }

    /// Remove the entry `registration` was issued for. Returns false if the
    /// id has since been evicted or registered again.
    pub fn release(&self, registration: &Registration) -> bool {
        let removed = {
            let mut instances = self.instances.lock();
            let current = instances
                .get(registration.id.as_str())
                .is_some_and(|handle| handle.generation() == registration.generation);
            if !current {
                debug!(target: "sync", "release of superseded registration for {} ignored", registration.id);
                return false;
            }
            let removed = instances.remove(registration.id.as_str());
            self.hub
                .publish(SyncEvent::InstancesChanged(sorted_ids(&instances)));
            info!(target: "sync", "instance {} unregistered ({} live)", registration.id, instances.len());
            removed
        };
        removed.is_some()
    }

    /// Refresh the heartbeat for `id`. A heartbeat for an unknown or evicted
    /// id is dropped; it never re-registers.
    pub fn heartbeat(&self, id: &str) -> bool {
        self.touch(id, None)
    }

    /// Heartbeat on behalf of `registration`. Dropped once it is superseded.
    pub fn renew(&self, registration: &Registration) -> bool {
        self.touch(registration.id.as_str(), Some(registration.generation))
    }

    /// Whether `registration` is still the live entry for its id.
    pub fn is_current(&self, registration: &Registration) -> bool {
        self.instances
            .lock()
            .get(registration.id.as_str())
            .is_some_and(|handle| handle.generation() == registration.generation)
    }

    /// Queue `state` for every live instance except `source`, then record the
    /// transition. Returns the number of peers the update was queued for.
    ///
    /// A broadcast from an instance that is not live is dropped.
    pub fn broadcast_state_change(&self, source: &str, state: &InstanceState) -> usize {
        self.fan_out(
            source,
            None,
            StateUpdate::snapshot(InstanceId::new(source), state.clone()),
        )
    }

    /// Broadcast on behalf of `registration`. Dropped once it is superseded.
    pub fn broadcast_update(&self, registration: &Registration, update: StateUpdate) -> usize {
        self.fan_out(
            registration.id.as_str(),
            Some(registration.generation),
            update,
        )
    }

    fn touch(&self, id: &str, generation: Option<u64>) -> bool {
        let mut instances = self.instances.lock();
        match instances.get_mut(id) {
            Some(handle) if generation.map_or(true, |g| g == handle.generation()) => {
                handle.touch(Instant::now());
                true
            }
            _ => {
                debug!(target: "sync", "heartbeat from unknown instance {} dropped", id);
                false
            }
        }
    }

    fn fan_out(&self, source: &str, generation: Option<u64>, update: StateUpdate) -> usize {
        let (targets, active): (Vec<DeliveryTarget>, Vec<InstanceId>) = {
            let mut instances = self.instances.lock();
            let source_id = match instances.get_mut(source) {
                Some(handle) if generation.map_or(true, |g| g == handle.generation()) => {
                    handle.report(update.state.clone());
                    handle.id().clone()
                }
                _ => {
                    debug!(target: "sync", "broadcast from unknown instance {} dropped", source);
                    return 0;
                }
            };
            let targets = instances
                .values()
                .filter(|handle| *handle.id() != source_id)
                .map(InstanceHandle::delivery)
                .collect();
            (targets, sorted_ids(&instances))
        };

        let queued = targets
            .iter()
            .filter(|target| target.send(update.clone()))
            .count();
        debug!(target: "sync", "{} broadcast to {} peer(s)", source, queued);

        self.snapshots.write(Snapshot::state_change(
            InstanceId::new(source),
            update.state,
            active,
        ));
        queued
    }

    /// Evict every instance silent for longer than the staleness threshold.
    pub fn sweep(&self) -> Vec<InstanceId> {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) against an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> Vec<InstanceId> {
        let threshold = self.config.staleness_threshold();
        let evicted: Vec<InstanceHandle> = {
            let mut instances = self.instances.lock();
            let stale: Vec<InstanceId> = instances
                .values()
                .filter(|handle| handle.is_stale(now, threshold))
                .map(|handle| handle.id().clone())
                .collect();
            let evicted: Vec<InstanceHandle> = stale
                .iter()
                .filter_map(|id| instances.remove(id))
                .collect();
            if !evicted.is_empty() {
                self.hub
                    .publish(SyncEvent::InstancesChanged(sorted_ids(&instances)));
            }
            evicted
        };

        for handle in &evicted {
            warn!(
                target: "sync",
                "evicted {} after {:?} without a heartbeat",
                handle.id(),
                now.saturating_duration_since(handle.last_heartbeat())
            );
        }
        evicted.into_iter().map(|handle| handle.id().clone()).collect()
    }

    /// Live ids, sorted.
    pub fn live_ids(&self) -> Vec<InstanceId> {
        sorted_ids(&self.instances.lock())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Last state `id` reported through a broadcast (or registered with).
    pub fn last_reported_state(&self, id: &str) -> Option<InstanceState> {
        self.instances.lock().get(id).map(|h| h.state().clone())
    }

    pub fn last_heartbeat(&self, id: &str) -> Option<Instant> {
        self.instances.lock().get(id).map(InstanceHandle::last_heartbeat)
    }

    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.hub.subscribe()
    }

    pub fn notifier(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn snapshots(&self) -> &SnapshotWriter {
        &self.snapshots
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("config", &self.config)
            .field("live", &self.live_ids())
            .finish()
    }
}

fn sorted_ids(instances: &HashMap<InstanceId, InstanceHandle>) -> Vec<InstanceId> {
    let mut ids: Vec<InstanceId> = instances.keys().cloned().collect();
    ids.sort();
    ids
}
