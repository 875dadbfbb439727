use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Snapshot, SnapshotSink};

/// Keeps the latest snapshot as a pretty-printed JSON file, overwritten on
/// every write.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    fn write(&self, snapshot: &Snapshot) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!(target: "snapshot", "could not create {}: {}", parent.display(), e);
                return;
            }
        }
        let data = match serde_json::to_vec_pretty(snapshot) {
            Ok(data) => data,
            Err(e) => {
                log::warn!(target: "snapshot", "could not serialize snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, data) {
            log::warn!(target: "snapshot", "error writing {}: {}", self.path.display(), e);
        }
    }

    fn read(&self) -> Option<Snapshot> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!(target: "snapshot", "error reading {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!(target: "snapshot", "malformed snapshot {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
