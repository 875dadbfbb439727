//! Snapshot persistence.
//!
//! A snapshot is a JSON record of one state transition, kept for history and
//! debugging only. Nothing in the sync path reads snapshots back to make a
//! decision. Writes are best-effort: a [`SnapshotSink`] logs its own failures
//! and never reports them to the caller.

mod file;
mod memory;
mod writer;

pub use file::JsonFileSink;
pub use memory::MemorySink;
pub use writer::SnapshotWriter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadspace_types::{Action, InstanceId, InstanceState};

/// Written by the registry after a broadcast fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub source_instance: InstanceId,
    pub state: InstanceState,
    pub active_instances: Vec<InstanceId>,
}

/// Written by an instance after it applies a resolved command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub timestamp: DateTime<Utc>,
    pub source_instance: InstanceId,
    pub command: String,
    pub action: Action,
    pub state: InstanceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    StateChange(StateChangeRecord),
    Command(CommandRecord),
}

impl Snapshot {
    pub fn state_change(
        source: InstanceId,
        state: InstanceState,
        active_instances: Vec<InstanceId>,
    ) -> Self {
        Snapshot::StateChange(StateChangeRecord {
            timestamp: Utc::now(),
            source_instance: source,
            state,
            active_instances,
        })
    }

    pub fn command(
        source: InstanceId,
        command: impl Into<String>,
        action: Action,
        state: InstanceState,
    ) -> Self {
        Snapshot::Command(CommandRecord {
            timestamp: Utc::now(),
            source_instance: source,
            command: command.into(),
            action,
            state,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Snapshot::StateChange(r) => r.timestamp,
            Snapshot::Command(r) => r.timestamp,
        }
    }

    pub fn source_instance(&self) -> &InstanceId {
        match self {
            Snapshot::StateChange(r) => &r.source_instance,
            Snapshot::Command(r) => &r.source_instance,
        }
    }

    pub fn state(&self) -> &InstanceState {
        match self {
            Snapshot::StateChange(r) => &r.state,
            Snapshot::Command(r) => &r.state,
        }
    }

    /// One-line summary for history views.
    pub fn summary(&self) -> String {
        let time = self.timestamp().format("%H:%M:%S");
        match self {
            Snapshot::StateChange(r) => format!(
                "{} {} synced to {} instance(s)",
                time,
                r.source_instance,
                r.active_instances.len()
            ),
            Snapshot::Command(r) => format!(
                "{} {} \"{}\" -> {}",
                time,
                r.source_instance,
                r.command,
                r.action.describe()
            ),
        }
    }
}

/// Persistence collaborator consumed by the registry and instances.
pub trait SnapshotSink: Send + Sync {
    /// Persist a record. Failures are logged by the sink, never returned.
    fn write(&self, snapshot: &Snapshot);

    /// Most recent record, if any. Display only.
    fn read(&self) -> Option<Snapshot>;
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn write(&self, _snapshot: &Snapshot) {}

    fn read(&self) -> Option<Snapshot> {
        None
    }
}

/// Writes to every sink in order; reads from the first sink that has a record.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<std::sync::Arc<dyn SnapshotSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: std::sync::Arc<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SnapshotSink for SinkSet {
    fn write(&self, snapshot: &Snapshot) {
        for sink in &self.sinks {
            sink.write(snapshot);
        }
    }

    fn read(&self) -> Option<Snapshot> {
        self.sinks.iter().find_map(|sink| sink.read())
    }
}
