#![allow(dead_code)]
//! Test harness utilities for threadspace-sync integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use threadspace_core::snapshot::MemorySink;
use threadspace_core::{ActionResolver, NotificationHub, SnapshotWriter, SyncConfig};
use threadspace_sync::{InstanceHandle, PluginInstance, StateUpdate, SyncRegistry};
use threadspace_types::{InstanceId, InstanceState};

/// A registry with default timing, no background sweep, and an in-memory
/// snapshot sink.
pub fn make_registry() -> (Arc<SyncRegistry>, Arc<MemorySink>) {
    make_registry_with(SyncConfig::default())
}

pub fn make_registry_with(config: SyncConfig) -> (Arc<SyncRegistry>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(64));
    let writer = SnapshotWriter::spawn(sink.clone()).unwrap();
    let registry = Arc::new(SyncRegistry::new(config, NotificationHub::new(), writer));
    (registry, sink)
}

/// Timing short enough for tests that rely on the background sweep.
pub fn fast_config() -> SyncConfig {
    SyncConfig::new(
        Duration::from_millis(10),
        Duration::from_millis(10),
        Duration::from_millis(300),
    )
    .unwrap()
}

/// Register a channel-backed handle and return the receiving end.
pub fn register_channel(registry: &SyncRegistry, id: &str) -> Receiver<StateUpdate> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = InstanceHandle::with_channel(id, InstanceState::default(), tx).unwrap();
    registry.register(handle);
    rx
}

pub fn attach(id: &str, registry: &Arc<SyncRegistry>) -> PluginInstance {
    PluginInstance::attach(
        id,
        InstanceState::default(),
        Arc::new(ActionResolver::standard()),
        registry.clone(),
    )
    .unwrap()
}

pub fn ids(names: &[&str]) -> Vec<InstanceId> {
    names.iter().map(|n| InstanceId::new(*n)).collect()
}

/// Poll `condition` until it holds, or panic after `timeout`.
pub fn wait_for(timeout: Duration, what: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while Instant::now().duration_since(start) < timeout {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out waiting for {}", what);
}
