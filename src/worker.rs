// Dedicated worker thread for one diff run.
// The host gets a receiver of protocol messages; dropping it abandons the run.

use crate::comparer::DiffEngine;
use crate::config::RunConfig;
use crate::emitter::{Message, MessageSink};
use crate::error::DiffError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

// Messages the worker may run ahead of the host before a send blocks.
pub const CHANNEL_CAPACITY: usize = 64;

pub struct DiffWorker {
    rx: Receiver<Message>,
    handle: JoinHandle<()>,
}

/// Start a run on its own thread. Messages arrive in protocol order and end
/// with exactly one `done` or `error`. At most [`CHANNEL_CAPACITY`] messages
/// are buffered, so a slow host holds the worker back instead of letting
/// finished batches pile up.
pub fn spawn(config: RunConfig) -> Result<DiffWorker, DiffError> {
    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    let handle = thread::Builder::new()
        .name("csvdiff-worker".to_string())
        .spawn(move || run_worker(config, tx))?;
    Ok(DiffWorker { rx, handle })
}

fn run_worker(config: RunConfig, mut tx: Sender<Message>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut engine = DiffEngine::new(config);
        engine.run(&mut tx)
    }));
    let err = match outcome {
        Ok(Ok(_)) => return,
        Ok(Err(DiffError::Disconnected)) => {
            debug!("worker: receiver dropped, discarding run");
            return;
        }
        Ok(Err(e)) => e,
        Err(payload) => DiffError::WorkerPanicked(panic_message(payload.as_ref())),
    };
    error!("worker: run failed: {}", err);
    let _ = tx.emit(Message::Error {
        error: err.to_string(),
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl DiffWorker {
    pub fn messages(&self) -> &Receiver<Message> {
        &self.rx
    }

    /// Block until the run ends, collecting every message.
    pub fn collect(self) -> Vec<Message> {
        let messages: Vec<Message> = self.rx.iter().collect();
        let _ = self.handle.join();
        messages
    }

    /// Abandon the run. The worker notices on its next send and exits;
    /// any in-flight work is discarded.
    pub fn cancel(self) {
        drop(self.rx);
    }

    pub fn join(self) {
        drop(self.rx);
        let _ = self.handle.join();
    }
}

impl IntoIterator for DiffWorker {
    type Item = Message;
    type IntoIter = crossbeam_channel::IntoIter<Message>;

    // The worker thread is detached; it exits once its sender is dropped.
    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}
