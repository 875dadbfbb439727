//! Background snapshot writer.
//!
//! Records are pushed onto an unbounded channel and written by a dedicated
//! thread, keeping file I/O off the registry lock and off instance threads.
//! The thread exits once every `SnapshotWriter` clone has been dropped.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use super::{Snapshot, SnapshotSink};

enum WriterMsg {
    Write(Box<Snapshot>),
    Flush(Sender<()>),
}

#[derive(Clone)]
pub struct SnapshotWriter {
    tx: Sender<WriterMsg>,
    sink: Arc<dyn SnapshotSink>,
}

impl SnapshotWriter {
    pub fn spawn(sink: Arc<dyn SnapshotSink>) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_sink = sink.clone();
        thread::Builder::new()
            .name("snapshot-writer".into())
            .spawn(move || writer_loop(rx, thread_sink))?;
        Ok(Self { tx, sink })
    }

    /// Queue a record. Never blocks.
    pub fn write(&self, snapshot: Snapshot) {
        if self.tx.send(WriterMsg::Write(Box::new(snapshot))).is_err() {
            log::warn!(target: "snapshot", "writer thread gone, snapshot dropped");
        }
    }

    /// Most recent record from the sink. Display only.
    pub fn read_last(&self) -> Option<Snapshot> {
        self.sink.read()
    }

    /// Wait until every record queued before this call has been written.
    /// Returns false on timeout.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(WriterMsg::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("queued", &self.tx.len())
            .finish()
    }
}

fn writer_loop(rx: Receiver<WriterMsg>, sink: Arc<dyn SnapshotSink>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WriterMsg::Write(snapshot) => sink.write(&snapshot),
            WriterMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    log::debug!(target: "snapshot", "writer thread exiting");
}
