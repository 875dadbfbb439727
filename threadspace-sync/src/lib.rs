//! Multi-instance synchronization for ThreadSpace.
//!
//! [`SyncRegistry`] tracks live plugin instances through heartbeats, fans state
//! changes out to every peer except the source, and evicts instances that go
//! silent for longer than the staleness threshold. [`PluginInstance`] is the
//! per-instance side: it owns the live state, turns commands into actions and
//! keeps its registry entry alive.

pub mod error;
pub mod handle;
pub mod instance;
pub mod periodic;
pub mod registry;
pub mod update;

pub use error::{DeliveryError, SyncError};
pub use handle::{DeliverySink, InstanceHandle, DELIVERY_QUEUE_CAPACITY};
pub use instance::PluginInstance;
pub use periodic::PeriodicTask;
pub use registry::{Registration, SyncRegistry};
pub use update::{Replica, Stamp, StateUpdate, UpdateKind};
