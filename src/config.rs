// Run configuration handed to the engine once per run.

use crate::error::DiffError;
use crate::parser::header::ColumnMapping;
use crate::source::{ByteSource, DEFAULT_CHUNK_SIZE};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Clone)]
pub struct RunConfig {
    pub old: Arc<dyn ByteSource>,
    pub new: Arc<dyn ByteSource>,
    /// Composite key columns, old-file positions. Same length as `key_indices_new`.
    pub key_indices_old: Vec<usize>,
    pub key_indices_new: Vec<usize>,
    /// One entry per new-file column; `None` when the column is absent from the old file.
    pub column_mapping: ColumnMapping,
    pub chunk_size: usize,
    pub delimiter_old: char,
    pub delimiter_new: char,
    /// Enables the row-hash fast path. Only sound when both headers are identical.
    pub are_headers_identical: bool,
    pub batch_size: usize,
}

impl RunConfig {
    pub fn new(
        old: Arc<dyn ByteSource>,
        new: Arc<dyn ByteSource>,
        key_indices_old: Vec<usize>,
        key_indices_new: Vec<usize>,
        column_mapping: ColumnMapping,
    ) -> Self {
        Self {
            old,
            new,
            key_indices_old,
            key_indices_new,
            column_mapping,
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter_old: ',',
            delimiter_new: ',',
            are_headers_identical: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_delimiters(mut self, old: char, new: char) -> Self {
        self.delimiter_old = old;
        self.delimiter_new = new;
        self
    }

    pub fn with_headers_identical(mut self, identical: bool) -> Self {
        self.are_headers_identical = identical;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    // Checks that need no I/O. Header-dependent checks run in the engine.
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.key_indices_old.is_empty() || self.key_indices_new.is_empty() {
            return Err(DiffError::NoKeyColumns);
        }
        if self.key_indices_old.len() != self.key_indices_new.len() {
            return Err(DiffError::InvalidConfig(format!(
                "key column counts differ: old has {}, new has {}",
                self.key_indices_old.len(),
                self.key_indices_new.len()
            )));
        }
        if self.chunk_size == 0 {
            return Err(DiffError::InvalidConfig("chunk size must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(DiffError::InvalidConfig("batch size must be positive".into()));
        }
        for d in [self.delimiter_old, self.delimiter_new] {
            if d == '"' || d == '\n' || d == '\r' {
                return Err(DiffError::InvalidConfig(format!(
                    "unsupported delimiter {:?}",
                    d
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("old_len", &self.old.len())
            .field("new_len", &self.new.len())
            .field("key_indices_old", &self.key_indices_old)
            .field("key_indices_new", &self.key_indices_new)
            .field("column_mapping", &self.column_mapping)
            .field("chunk_size", &self.chunk_size)
            .field("delimiter_old", &self.delimiter_old)
            .field("delimiter_new", &self.delimiter_new)
            .field("are_headers_identical", &self.are_headers_identical)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn config(old_keys: Vec<usize>, new_keys: Vec<usize>) -> RunConfig {
        RunConfig::new(
            Arc::new(MemorySource::new(Vec::new())),
            Arc::new(MemorySource::new(Vec::new())),
            old_keys,
            new_keys,
            ColumnMapping::identity(2),
        )
    }

    #[test]
    fn defaults() {
        let cfg = config(vec![0], vec![0]);
        assert_eq!(cfg.chunk_size, 8 * 1024 * 1024);
        assert_eq!(cfg.batch_size, 500);
        assert_eq!((cfg.delimiter_old, cfg.delimiter_new), (',', ','));
        assert!(!cfg.are_headers_identical);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            config(vec![], vec![]).validate(),
            Err(DiffError::NoKeyColumns)
        ));
        assert!(config(vec![0, 1], vec![0]).validate().is_err());
        assert!(config(vec![0], vec![0]).with_chunk_size(0).validate().is_err());
        assert!(config(vec![0], vec![0]).with_batch_size(0).validate().is_err());
        assert!(config(vec![0], vec![0])
            .with_delimiters('"', ',')
            .validate()
            .is_err());
    }
}
