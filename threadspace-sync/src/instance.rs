//! Per-instance assembly: live state, command intake, registry membership and
//! the heartbeat task.

use std::sync::{Arc, Weak};

use log::{debug, info};
use parking_lot::Mutex;

use threadspace_core::snapshot::Snapshot;
use threadspace_core::{ActionResolver, NotificationHub, SyncEvent};
use threadspace_types::{Action, InstanceId, InstanceState};

use crate::{
    DeliveryError, InstanceHandle, PeriodicTask, Registration, Replica, StateUpdate, SyncError,
    SyncRegistry,
};

/// One plugin instance attached to a [`SyncRegistry`].
///
/// Registry calls go through the [`Registration`] issued at attach time. Once
/// the id is evicted or attached again elsewhere, this instance stops
/// heartbeating, broadcasting and unregistering on its behalf. Dropping the
/// instance stops its heartbeat and releases its own registration.
pub struct PluginInstance {
    registration: Registration,
    replica: Arc<Mutex<Replica>>,
    resolver: Arc<ActionResolver>,
    registry: Arc<SyncRegistry>,
    heartbeat: Mutex<Option<PeriodicTask>>,
}

impl PluginInstance {
    /// Register a new instance starting from `initial`. Peer updates are
    /// merged into its state on the instance's delivery worker.
    ///
    /// The heartbeat is not started; call [`start_heartbeat`](Self::start_heartbeat).
    pub fn attach(
        id: impl Into<InstanceId>,
        initial: InstanceState,
        resolver: Arc<ActionResolver>,
        registry: Arc<SyncRegistry>,
    ) -> Result<Self, SyncError> {
        let id = id.into();
        let replica = Arc::new(Mutex::new(Replica::new(id.clone(), initial.clone())));

        let sink = remote_merge(id.clone(), Arc::downgrade(&replica), registry.notifier().clone());
        let handle = InstanceHandle::new(id.clone(), initial, sink)
            .map_err(|e| SyncError::spawn(format!("deliver-{}", id), e))?;
        let registration = registry.register(handle);

        Ok(Self {
            registration,
            replica,
            resolver,
            registry,
            heartbeat: Mutex::new(None),
        })
    }

    /// Heartbeat every `heartbeat_interval` until stopped, dropped or
    /// superseded.
    pub fn start_heartbeat(&self) -> Result<(), SyncError> {
        let mut slot = self.heartbeat.lock();
        if slot.as_ref().is_some_and(|task| task.is_running()) {
            return Ok(());
        }
        let name = format!("heartbeat-{}", self.id());
        let registry: Weak<SyncRegistry> = Arc::downgrade(&self.registry);
        let registration = self.registration.clone();
        let task = PeriodicTask::spawn(
            name.clone(),
            self.registry.config().heartbeat_interval(),
            move || match registry.upgrade() {
                Some(registry) => registry.renew(&registration),
                None => false,
            },
        )
        .map_err(|e| SyncError::spawn(name, e))?;
        *slot = Some(task);
        Ok(())
    }

    /// Stop heartbeating. The registry entry stays until the sweep evicts it.
    pub fn stop_heartbeat(&self) {
        let task = self.heartbeat.lock().take();
        if let Some(mut task) = task {
            task.stop();
            debug!(target: "sync", "{} heartbeat stopped", self.id());
        }
    }

    /// Send one heartbeat now.
    pub fn heartbeat(&self) -> bool {
        self.registry.renew(&self.registration)
    }

    /// Resolve `text`, apply the action, notify observers and broadcast the
    /// stamped command to every peer. Unrecognized text changes nothing.
    pub fn process_command(&self, text: &str) -> Option<Action> {
        let Some(action) = self.resolver.resolve(text) else {
            debug!(target: "command", "{}: no action for {:?}", self.id(), text);
            return None;
        };

        // Held across the broadcast so one instance's updates stay in apply
        // order on every peer queue.
        let state = {
            let mut replica = self.replica.lock();
            let (changed, update) = replica.apply_local(action);
            if !changed {
                debug!(target: "command", "{}: {} left state unchanged", self.id(), action.describe());
            }
            self.registry.notifier().publish(SyncEvent::StateUpdated {
                instance: self.id().clone(),
                state: update.state.clone(),
            });
            let state = update.state.clone();
            self.registry.broadcast_update(&self.registration, update);
            state
        };

        info!(target: "command", "{}: {:?} -> {}", self.id(), text, action.describe());
        self.registry
            .snapshots()
            .write(Snapshot::command(self.id().clone(), text, action, state));
        Some(action)
    }

    pub fn state(&self) -> InstanceState {
        self.replica.lock().state().clone()
    }

    pub fn id(&self) -> &InstanceId {
        self.registration.id()
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Whether the registry still holds this instance's own registration.
    pub fn is_live(&self) -> bool {
        self.registry.is_current(&self.registration)
    }

    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    /// Most recent snapshot record. Display only.
    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.registry.snapshots().read_last()
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        self.stop_heartbeat();
        self.registry.release(&self.registration);
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("registration", &self.registration)
            .field("replica", &*self.replica.lock())
            .finish()
    }
}

/// Delivery sink that merges a peer update into the local replica.
fn remote_merge(
    id: InstanceId,
    replica: Weak<Mutex<Replica>>,
    hub: NotificationHub,
) -> impl Fn(StateUpdate) -> Result<(), DeliveryError> + Send + Sync + 'static {
    move |update: StateUpdate| -> Result<(), DeliveryError> {
        let replica = replica.upgrade().ok_or(DeliveryError::Disconnected)?;
        let mut local = replica.lock();
        if local.merge(&update) {
            hub.publish(SyncEvent::StateUpdated {
                instance: id.clone(),
                state: local.state().clone(),
            });
            debug!(target: "sync::delivery", "{} merged update from {}", id, update.source);
        }
        Ok(())
    }
}
