use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{Snapshot, SnapshotSink};

/// Bounded in-memory history, newest first.
#[derive(Debug)]
pub struct MemorySink {
    history: Mutex<VecDeque<Snapshot>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Recent records, newest first.
    pub fn recent(&self) -> Vec<Snapshot> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}

impl SnapshotSink for MemorySink {
    fn write(&self, snapshot: &Snapshot) {
        let mut history = self.history.lock();
        history.push_front(snapshot.clone());
        history.truncate(self.capacity);
    }

    fn read(&self) -> Option<Snapshot> {
        self.history.lock().front().cloned()
    }
}
