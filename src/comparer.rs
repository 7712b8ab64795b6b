// Comparison pipeline: index the old file by key, stream the new file against
// the index, then sweep the index for rows the new file never matched.
// Phases run strictly in order and share one index owned by the engine.

use crate::align::{align, diff_indices};
use crate::config::RunConfig;
use crate::emitter::{DiffRow, DiffStats, MessageSink, ResultEmitter};
use crate::error::{DiffError, FileSide};
use crate::hashing::{build_key, display_key, row_hash};
use crate::index::OldFileIndex;
use crate::parser::fields::tokenize;
use crate::parser::header::read_header;
use crate::parser::lines::{scan_lines, LineSpan, LineSplitter, LineVisitor};
use crate::source::read_range;
use std::time::Instant;
use tracing::{debug, info};

// Progress bands per phase, in percent of the whole run.
const INDEX_END: f64 = 40.0;
const COMPARE_END: f64 = 80.0;
const REMOVAL_END: f64 = 100.0;
// Removal sweep reports progress and yields every this many entries.
const REMOVAL_STEP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Indexing,
    Comparing,
    ScanningRemovals,
    Done,
    Error,
}

pub struct DiffEngine {
    config: RunConfig,
    index: OldFileIndex,
    state: RunState,
}

impl DiffEngine {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            index: OldFileIndex::new(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    // Main pipeline. Configuration errors surface before the first status
    // message; the index is dropped whether the run succeeds or not.
    pub fn run(&mut self, sink: &mut dyn MessageSink) -> Result<DiffStats, DiffError> {
        let start = Instant::now();
        let result = self.run_phases(sink);
        self.index = OldFileIndex::new();
        match &result {
            Ok(stats) => {
                self.state = RunState::Done;
                info!(
                    added = stats.added,
                    removed = stats.removed,
                    modified = stats.modified,
                    "Diff complete in {:?}",
                    start.elapsed()
                );
            }
            Err(e) => {
                debug!("Diff aborted in state {:?}: {}", self.state, e);
                self.state = RunState::Error;
            }
        }
        result
    }

    fn run_phases(&mut self, sink: &mut dyn MessageSink) -> Result<DiffStats, DiffError> {
        self.check_headers()?;
        let mut emitter = ResultEmitter::new(sink, self.config.batch_size);
        self.index_old_file(&mut emitter)?;
        self.compare_new_file(&mut emitter)?;
        self.scan_removals(&mut emitter)?;
        emitter.done()
    }

    // Validate key columns and the column mapping against both headers.
    fn check_headers(&self) -> Result<(), DiffError> {
        let cfg = &self.config;
        cfg.validate()?;
        let old_width = read_header(cfg.old.as_ref(), cfg.delimiter_old)?.len();
        let new_width = read_header(cfg.new.as_ref(), cfg.delimiter_new)?.len();
        debug!("CheckHeaders: old has {} columns, new has {}", old_width, new_width);

        for (side, keys, width) in [
            (FileSide::Old, &cfg.key_indices_old, old_width),
            (FileSide::New, &cfg.key_indices_new, new_width),
        ] {
            if let Some(&index) = keys.iter().find(|&&i| i >= width) {
                return Err(DiffError::MissingKeyColumn { side, index, width });
            }
        }

        if cfg.column_mapping.len() != new_width {
            return Err(DiffError::InvalidConfig(format!(
                "column mapping has {} entries but the new header has {} columns",
                cfg.column_mapping.len(),
                new_width
            )));
        }
        if let Some(bad) = cfg
            .column_mapping
            .as_slice()
            .iter()
            .flatten()
            .find(|&&i| i >= old_width)
        {
            return Err(DiffError::InvalidConfig(format!(
                "column mapping points at old column {} but the old header has {} columns",
                bad, old_width
            )));
        }
        Ok(())
    }

    // Phase 1: one pass over the old file, recording where each key lives.
    fn index_old_file(&mut self, emitter: &mut ResultEmitter<'_>) -> Result<(), DiffError> {
        self.state = RunState::Indexing;
        debug!("IndexOldFile: scanning {} bytes", self.config.old.len());
        emitter.status("Indexing old file...", 0)?;

        let start = Instant::now();
        let mut pass = IndexPass {
            config: &self.config,
            index: &mut self.index,
            emitter: &mut *emitter,
            rows: 0,
            skipped: 0,
        };
        let mut splitter = LineSplitter::new();
        scan_lines(
            self.config.old.as_ref(),
            self.config.chunk_size,
            &mut splitter,
            &mut pass,
        )?;
        let (rows, skipped) = (pass.rows, pass.skipped);
        emitter.flush()?;

        info!(
            rows,
            keys = self.index.len(),
            overwritten = self.index.overwritten(),
            skipped_empty_keys = skipped,
            "Indexed old file in {:?}",
            start.elapsed()
        );
        Ok(())
    }

    // Phase 2: classify every new row as added, unchanged or modified.
    fn compare_new_file(&mut self, emitter: &mut ResultEmitter<'_>) -> Result<(), DiffError> {
        self.state = RunState::Comparing;
        debug!(
            "CompareNewFile: scanning {} bytes, fast path {}",
            self.config.new.len(),
            self.config.are_headers_identical
        );
        emitter.status("Comparing new file...", INDEX_END as u8)?;

        let start = Instant::now();
        let mut pass = ComparePass {
            config: &self.config,
            index: &mut self.index,
            emitter: &mut *emitter,
            unchanged: 0,
            fast_path_hits: 0,
            skipped: 0,
        };
        let mut splitter = LineSplitter::new();
        scan_lines(
            self.config.new.as_ref(),
            self.config.chunk_size,
            &mut splitter,
            &mut pass,
        )?;
        let (unchanged, fast_path_hits, skipped) = (pass.unchanged, pass.fast_path_hits, pass.skipped);
        emitter.flush()?;

        let stats = emitter.stats();
        info!(
            added = stats.added,
            modified = stats.modified,
            unchanged,
            fast_path_hits,
            skipped_empty_keys = skipped,
            "Compared new file in {:?}",
            start.elapsed()
        );
        Ok(())
    }

    // Phase 3: every entry the new file never visited is a removal.
    fn scan_removals(&mut self, emitter: &mut ResultEmitter<'_>) -> Result<(), DiffError> {
        self.state = RunState::ScanningRemovals;
        emitter.status("Scanning for removed rows...", COMPARE_END as u8)?;

        let start = Instant::now();
        let total = self.index.len();
        for (i, entry) in self.index.entries().iter().enumerate() {
            if !entry.visited {
                let old_row = read_old_row(&self.config, entry.offset, entry.length)?;
                emitter.push(DiffRow::Removed {
                    key: display_key(&entry.key).to_string(),
                    old_row,
                })?;
            }
            let scanned = i + 1;
            if scanned % REMOVAL_STEP == 0 {
                emitter.progress(band(COMPARE_END, REMOVAL_END, scanned as u64, total as u64))?;
                std::thread::yield_now();
            }
        }
        emitter.progress(REMOVAL_END)?;
        emitter.flush()?;

        info!(
            removed = emitter.stats().removed,
            entries = total,
            "Scanned for removals in {:?}",
            start.elapsed()
        );
        Ok(())
    }
}

fn band(from: f64, to: f64, done: u64, total: u64) -> f64 {
    if total == 0 {
        return to;
    }
    from + (to - from) * (done as f64 / total as f64)
}

// Re-read a recorded old row and put it in new-file column order.
fn read_old_row(config: &RunConfig, offset: u64, length: u32) -> Result<Vec<String>, DiffError> {
    let bytes = read_range(config.old.as_ref(), offset, length)?;
    let raw = if bytes.is_empty() {
        Vec::new()
    } else {
        tokenize(&String::from_utf8_lossy(&bytes), config.delimiter_old)
    };
    Ok(align(&raw, &config.column_mapping))
}

struct IndexPass<'a, 's> {
    config: &'a RunConfig,
    index: &'a mut OldFileIndex,
    emitter: &'a mut ResultEmitter<'s>,
    rows: u64,
    skipped: u64,
}

impl LineVisitor for IndexPass<'_, '_> {
    fn on_line(&mut self, span: LineSpan, line: &[u8]) -> Result<(), DiffError> {
        self.rows += 1;
        let fields = tokenize(&String::from_utf8_lossy(line), self.config.delimiter_old);
        match build_key(&fields, &self.config.key_indices_old) {
            Some(key) => self.index.insert(key, span.offset, span.length, row_hash(&fields)),
            None => self.skipped += 1,
        }
        Ok(())
    }

    fn on_chunk(&mut self, consumed: u64, total: u64) -> Result<(), DiffError> {
        self.emitter.progress(band(0.0, INDEX_END, consumed, total))
    }
}

struct ComparePass<'a, 's> {
    config: &'a RunConfig,
    index: &'a mut OldFileIndex,
    emitter: &'a mut ResultEmitter<'s>,
    unchanged: u64,
    fast_path_hits: u64,
    skipped: u64,
}

impl LineVisitor for ComparePass<'_, '_> {
    fn on_line(&mut self, _span: LineSpan, line: &[u8]) -> Result<(), DiffError> {
        let new_row = tokenize(&String::from_utf8_lossy(line), self.config.delimiter_new);
        let key = match build_key(&new_row, &self.config.key_indices_new) {
            Some(k) => k,
            None => {
                self.skipped += 1;
                return Ok(());
            }
        };

        let (offset, length, old_hash) = match self.index.visit(&key) {
            Some(entry) => (entry.offset, entry.length, entry.hash),
            None => {
                return self.emitter.push(DiffRow::Added {
                    key: display_key(&key).to_string(),
                    new_row,
                });
            }
        };

        if self.config.are_headers_identical && row_hash(&new_row) == old_hash {
            self.unchanged += 1;
            self.fast_path_hits += 1;
            return Ok(());
        }

        let old_row = read_old_row(self.config, offset, length)?;
        let diff = diff_indices(&old_row, &new_row);
        if diff.is_empty() {
            self.unchanged += 1;
            return Ok(());
        }
        self.emitter.push(DiffRow::Modified {
            key: display_key(&key).to_string(),
            new_row,
            old_row,
            diff_indices: diff,
        })
    }

    fn on_chunk(&mut self, consumed: u64, total: u64) -> Result<(), DiffError> {
        self.emitter.progress(band(INDEX_END, COMPARE_END, consumed, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{CallbackSink, Message, VecSink};
    use crate::parser::header::ColumnMapping;
    use crate::source::MemorySource;
    use std::sync::Arc;

    fn engine(old: &str, new: &str, keys: Vec<usize>, width: usize) -> DiffEngine {
        DiffEngine::new(RunConfig::new(
            Arc::new(MemorySource::new(old.as_bytes().to_vec())),
            Arc::new(MemorySource::new(new.as_bytes().to_vec())),
            keys.clone(),
            keys,
            ColumnMapping::identity(width),
        ))
    }

    #[test]
    fn state_moves_to_done() {
        let mut e = engine("id,v\n1,a\n", "id,v\n1,b\n", vec![0], 2);
        assert_eq!(e.state(), RunState::Idle);
        let mut sink = VecSink::new();
        let stats = e.run(&mut sink).unwrap();
        assert_eq!(stats.modified, 1);
        assert_eq!(e.state(), RunState::Done);
    }

    #[test]
    fn callback_sink_sees_the_whole_run() {
        let mut e = engine("id,v\n1,a\n2,b\n", "id,v\n1,a\n3,c\n", vec![0], 2);
        let mut seen = Vec::new();
        let stats = e.run(&mut CallbackSink::new(|m| seen.push(m))).unwrap();
        assert_eq!((stats.added, stats.removed, stats.modified), (1, 1, 0));
        assert!(matches!(seen.first(), Some(Message::Status { progress: 0, .. })));
        assert_eq!(seen.last(), Some(&Message::Done { stats }));
        let keys: Vec<String> = seen
            .iter()
            .filter_map(|m| match m {
                Message::Batch { results } => Some(results.iter().map(|r| r.key().to_string())),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(keys, vec!["3", "2"]);
    }

    #[test]
    fn config_error_precedes_any_status() {
        let mut e = engine("id,v\n1,a\n", "id,v\n1,b\n", vec![5], 2);
        let mut sink = VecSink::new();
        let err = e.run(&mut sink).unwrap_err();
        assert!(matches!(
            err,
            DiffError::MissingKeyColumn {
                side: FileSide::Old,
                index: 5,
                width: 2
            }
        ));
        assert!(sink.messages().is_empty());
        assert_eq!(e.state(), RunState::Error);
    }

    #[test]
    fn mapping_width_must_match_new_header() {
        let mut e = engine("id,v\n", "id,v\n", vec![0], 3);
        assert!(matches!(
            e.run(&mut VecSink::new()),
            Err(DiffError::InvalidConfig(_))
        ));
    }

    #[test]
    fn progress_bands_end_at_100() {
        let mut e = engine("id,v\n1,a\n2,b\n", "id,v\n2,b\n3,c\n", vec![0], 2);
        let mut sink = VecSink::new();
        e.run(&mut sink).unwrap();
        let statuses: Vec<u8> = sink
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::Status { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![0, 40, 80]);
        let last_progress = sink.messages().iter().rev().find_map(|m| match m {
            Message::Progress { value } => Some(*value),
            _ => None,
        });
        assert_eq!(last_progress, Some(100));
    }

    #[test]
    fn corrupt_offset_yields_blank_row_instead_of_failing() {
        let cfg = RunConfig::new(
            Arc::new(MemorySource::new(b"id,v\n1,a\n".to_vec())),
            Arc::new(MemorySource::new(b"id,v\n".to_vec())),
            vec![0],
            vec![0],
            ColumnMapping::identity(2),
        );
        let row = read_old_row(&cfg, 10_000, 4).unwrap();
        assert_eq!(row, vec![String::new(), String::new()]);
    }

    #[test]
    fn bands() {
        assert_eq!(band(0.0, 40.0, 5, 10), 20.0);
        assert_eq!(band(80.0, 100.0, 0, 0), 100.0);
    }
}
