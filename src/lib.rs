// csvdiff: streaming, key-based diff of two large delimited text files.
//
// The old file is indexed by composite key without being loaded into memory,
// the new file is streamed against that index, and rows the new file never
// matched are reported as removed. Column order and names may differ between
// the files; a column mapping lines them up before cells are compared.

pub mod align;
pub mod comparer;
pub mod config;
pub mod emitter;
pub mod error;
pub mod hashing;
pub mod index;
pub mod parser;
pub mod source;
pub mod worker;

pub use comparer::{DiffEngine, RunState};
pub use config::{RunConfig, DEFAULT_BATCH_SIZE};
pub use emitter::{CallbackSink, DiffRow, DiffStats, Message, MessageSink, VecSink};
pub use error::{DiffError, FileSide};
pub use parser::header::ColumnMapping;
pub use source::{open_source, ByteSource, FileSource, MemorySource, MmapSource, DEFAULT_CHUNK_SIZE};
pub use worker::{spawn, DiffWorker, CHANNEL_CAPACITY};

/// Run a diff on the calling thread and collect every message.
pub fn diff_to_vec(config: RunConfig) -> Result<(DiffStats, Vec<Message>), DiffError> {
    let mut sink = VecSink::new();
    let stats = DiffEngine::new(config).run(&mut sink)?;
    Ok((stats, sink.into_messages()))
}
