//! # threadspace-core
//!
//! Building blocks shared by every ThreadSpace instance: command resolution,
//! configuration, snapshot persistence and observer notifications.
//!
//! ## Module Overview
//!
//! - [`resolver`]: `ActionResolver`, the ordered regex table that turns free
//!   text into an [`Action`](threadspace_types::Action)
//! - [`config`]: TOML configuration (embedded defaults + user override) and the
//!   validated `SyncConfig` timing constants
//! - [`snapshot`]: snapshot records, the `SnapshotSink` collaborator interface,
//!   file and memory sinks, and the background `SnapshotWriter`
//! - [`notify`]: `NotificationHub`, the typed publish/subscribe channel for
//!   `SyncEvent`s

pub mod config;
pub mod notify;
pub mod resolver;
pub mod snapshot;

pub use config::{Config, ConfigError, SyncConfig};
pub use notify::{NotificationHub, SyncEvent};
pub use resolver::{ActionResolver, ResolverError};
pub use snapshot::{Snapshot, SnapshotSink, SnapshotWriter};
