// Output protocol and the batching emitter.
// Rows are buffered and flushed in batches so peak memory does not grow with
// the size of the diff.

use crate::error::DiffError;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiffRow {
    Added {
        key: String,
        #[serde(rename = "newRow")]
        new_row: Vec<String>,
    },
    /// `old_row` is already aligned to the new file's columns.
    Removed {
        key: String,
        #[serde(rename = "oldRow")]
        old_row: Vec<String>,
    },
    Modified {
        key: String,
        #[serde(rename = "newRow")]
        new_row: Vec<String>,
        #[serde(rename = "oldRow")]
        old_row: Vec<String>,
        #[serde(rename = "diffIndices")]
        diff_indices: Vec<usize>,
    },
}

impl DiffRow {
    pub fn key(&self) -> &str {
        match self {
            DiffRow::Added { key, .. } | DiffRow::Removed { key, .. } | DiffRow::Modified { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
}

impl DiffStats {
    pub fn total(&self) -> u64 {
        self.added + self.removed + self.modified
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Status { message: String, progress: u8 },
    Progress { value: u8 },
    Batch { results: Vec<DiffRow> },
    Done { stats: DiffStats },
    Error { error: String },
}

/// Destination for engine output.
pub trait MessageSink {
    fn emit(&mut self, message: Message) -> Result<(), DiffError>;
}

// A closed receiver means the host abandoned the run.
impl MessageSink for Sender<Message> {
    fn emit(&mut self, message: Message) -> Result<(), DiffError> {
        self.send(message).map_err(|_| DiffError::Disconnected)
    }
}

/// Collects every message, for tests and synchronous callers.
#[derive(Debug, Default)]
pub struct VecSink {
    messages: Vec<Message>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl MessageSink for VecSink {
    fn emit(&mut self, message: Message) -> Result<(), DiffError> {
        self.messages.push(message);
        Ok(())
    }
}

/// Forwards messages to a callback.
pub struct CallbackSink<F: FnMut(Message)> {
    f: F,
}

impl<F: FnMut(Message)> CallbackSink<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: FnMut(Message)> MessageSink for CallbackSink<F> {
    fn emit(&mut self, message: Message) -> Result<(), DiffError> {
        (self.f)(message);
        Ok(())
    }
}

pub struct ResultEmitter<'a> {
    sink: &'a mut dyn MessageSink,
    batch: Vec<DiffRow>,
    batch_size: usize,
    stats: DiffStats,
    last_progress: Option<u8>,
}

impl<'a> ResultEmitter<'a> {
    pub fn new(sink: &'a mut dyn MessageSink, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            stats: DiffStats::default(),
            last_progress: None,
        }
    }

    pub fn status(&mut self, message: &str, progress: u8) -> Result<(), DiffError> {
        self.last_progress = Some(progress);
        self.sink.emit(Message::Status {
            message: message.to_string(),
            progress,
        })
    }

    // Only whole-percent changes are sent.
    pub fn progress(&mut self, value: f64) -> Result<(), DiffError> {
        let value = value.clamp(0.0, 100.0).floor() as u8;
        if self.last_progress == Some(value) {
            return Ok(());
        }
        self.last_progress = Some(value);
        self.sink.emit(Message::Progress { value })
    }

    pub fn push(&mut self, row: DiffRow) -> Result<(), DiffError> {
        match row {
            DiffRow::Added { .. } => self.stats.added += 1,
            DiffRow::Removed { .. } => self.stats.removed += 1,
            DiffRow::Modified { .. } => self.stats.modified += 1,
        }
        self.batch.push(row);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DiffError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let results = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        self.sink.emit(Message::Batch { results })
    }

    pub fn stats(&self) -> DiffStats {
        self.stats
    }

    /// Flush what is left and send the terminal summary.
    pub fn done(mut self) -> Result<DiffStats, DiffError> {
        self.flush()?;
        let stats = self.stats;
        self.sink.emit(Message::Done { stats })?;
        Ok(stats)
    }
}
