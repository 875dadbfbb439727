//! Registry-side view of one live instance.
//!
//! Every handle owns a bounded FIFO delivery queue drained by a dedicated
//! worker thread. The registry only ever pushes onto the queue without
//! blocking, so a slow or stuck sink stalls its own worker and nothing else;
//! once its queue is full further updates for that peer are dropped. Dropping
//! the handle closes the queue; the worker drains what is already queued and
//! exits.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use threadspace_types::{InstanceId, InstanceState};

use crate::{DeliveryError, StateUpdate};

/// Updates a peer may have queued before new ones are dropped.
pub const DELIVERY_QUEUE_CAPACITY: usize = 64;

/// Accepts peer updates into an instance's own execution context.
pub trait DeliverySink: Send + Sync + 'static {
    fn deliver(&self, update: StateUpdate) -> Result<(), DeliveryError>;
}

impl<F> DeliverySink for F
where
    F: Fn(StateUpdate) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    fn deliver(&self, update: StateUpdate) -> Result<(), DeliveryError> {
        self(update)
    }
}

pub struct InstanceHandle {
    id: InstanceId,
    generation: u64,
    state: InstanceState,
    last_heartbeat: Instant,
    queue: Sender<StateUpdate>,
}

impl InstanceHandle {
    /// Create a handle and start its delivery worker.
    pub fn new(
        id: impl Into<InstanceId>,
        state: InstanceState,
        sink: impl DeliverySink,
    ) -> io::Result<Self> {
        Self::with_queue_capacity(id, state, sink, DELIVERY_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(
        id: impl Into<InstanceId>,
        state: InstanceState,
        sink: impl DeliverySink,
        capacity: usize,
    ) -> io::Result<Self> {
        let id = id.into();
        let (queue, rx) = crossbeam_channel::bounded(capacity.max(1));
        let worker_id = id.clone();
        thread::Builder::new()
            .name(format!("deliver-{}", id))
            .spawn(move || delivery_loop(worker_id, rx, sink))?;

        Ok(Self {
            id,
            generation: 0,
            state,
            last_heartbeat: Instant::now(),
            queue,
        })
    }

    /// Handle whose sink forwards into a channel the instance drains itself.
    pub fn with_channel(
        id: impl Into<InstanceId>,
        state: InstanceState,
        tx: Sender<StateUpdate>,
    ) -> io::Result<Self> {
        Self::new(id, state, move |update: StateUpdate| {
            tx.send(update).map_err(|_| DeliveryError::Disconnected)
        })
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Registration generation; zero until registered.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last state this instance reported through the registry.
    pub fn state(&self) -> &InstanceState {
        &self.state
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > threshold
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    pub(crate) fn report(&mut self, state: InstanceState) {
        self.state = state;
    }

    pub(crate) fn delivery(&self) -> DeliveryTarget {
        DeliveryTarget {
            id: self.id.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("last_heartbeat", &self.last_heartbeat)
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// A peer's delivery queue, detached from the registry map so it can be fed
/// after the registry lock is released.
pub(crate) struct DeliveryTarget {
    id: InstanceId,
    queue: Sender<StateUpdate>,
}

impl DeliveryTarget {
    /// Queue without blocking. Returns false if the update was dropped.
    pub(crate) fn send(&self, update: StateUpdate) -> bool {
        match self.queue.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!(target: "sync::delivery", "delivery queue for {} is full, update dropped", self.id);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!(target: "sync::delivery", "delivery worker for {} is gone, update skipped", self.id);
                false
            }
        }
    }
}

fn delivery_loop(id: InstanceId, rx: Receiver<StateUpdate>, sink: impl DeliverySink) {
    while let Ok(update) = rx.recv() {
        if let Err(e) = sink.deliver(update) {
            log::warn!(target: "sync::delivery", "delivery to {} failed: {}", id, e);
        }
    }
    log::debug!(target: "sync::delivery", "delivery worker for {} exiting", id);
}
