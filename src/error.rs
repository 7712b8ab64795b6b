// Error taxonomy for a diff run.
// Configuration problems are raised before any phase starts; everything else
// aborts the run and is reported once as an `error` message by the worker.

use std::fmt;
use thiserror::Error;

/// Which of the two inputs an error or header refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSide {
    Old,
    New,
}

impl fmt::Display for FileSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSide::Old => f.write_str("old"),
            FileSide::New => f.write_str("new"),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key column {index} is not present in the {side} file header ({width} columns)")]
    MissingKeyColumn {
        side: FileSide,
        index: usize,
        width: usize,
    },
    #[error("key column '{name}' not found in the {side} file header")]
    UnknownKeyColumn { side: FileSide, name: String },
    #[error("no key column could be selected: the files share no columns")]
    NoKeyColumns,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("logical line at offset {offset} is longer than 4 GiB")]
    LineTooLong { offset: u64 },
    #[error("result receiver disconnected")]
    Disconnected,
    #[error("diff worker panicked: {0}")]
    WorkerPanicked(String),
}

impl DiffError {
    /// True for errors that can only come from the run configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            DiffError::MissingKeyColumn { .. }
                | DiffError::UnknownKeyColumn { .. }
                | DiffError::NoKeyColumns
                | DiffError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_side() {
        let err = DiffError::MissingKeyColumn {
            side: FileSide::Old,
            index: 3,
            width: 2,
        };
        assert_eq!(
            err.to_string(),
            "key column 3 is not present in the old file header (2 columns)"
        );
        assert!(err.is_config());
        assert!(!DiffError::Disconnected.is_config());
    }
}
