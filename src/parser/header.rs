// Header handling for the host side: read the first logical line, guess the
// delimiter, line up new columns with old ones and choose key columns.

use crate::error::{DiffError, FileSide};
use crate::parser::fields::tokenize;
use crate::parser::lines::LineSplitter;
use crate::source::{ByteSource, ChunkReader};
use tracing::debug;

const HEADER_CHUNK_SIZE: usize = 64 * 1024;
const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];
const KEY_PRIORITY: [&str; 4] = ["id", "uuid", "email", "sku"];

/// Raw first logical line of a source, BOM stripped. Empty for an empty source.
pub fn read_header_line(source: &dyn ByteSource) -> Result<String, DiffError> {
    let mut splitter = LineSplitter::new();
    let mut reader = ChunkReader::new(source, HEADER_CHUNK_SIZE);
    while splitter.header().is_none() {
        match reader.next_chunk()? {
            Some(chunk) => splitter.push(chunk.offset, &chunk.bytes, |_, _| Ok(()))?,
            None => {
                splitter.finish(|_, _| Ok(()))?;
                break;
            }
        }
    }
    let raw = splitter.header().unwrap_or_default();
    let text = String::from_utf8_lossy(raw);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Tokenized header of a source. An empty source has no columns.
pub fn read_header(source: &dyn ByteSource, delimiter: char) -> Result<Vec<String>, DiffError> {
    let line = read_header_line(source)?;
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(tokenize(&line, delimiter))
}

/// Most frequent candidate delimiter outside quotes, `,` when none appear.
pub fn detect_delimiter(header_line: &str) -> char {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    for c in header_line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = DELIMITER_CANDIDATES.iter().position(|d| *d == c) {
            counts[i] += 1;
        }
    }
    // Ties go to the earlier candidate.
    let (best, _) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &n)| if n > best.1 { (i, n) } else { best });
    DELIMITER_CANDIDATES[best]
}

/// For every new-file column, the old-file column holding the same data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMapping(pub Vec<Option<usize>>);

impl ColumnMapping {
    /// Match new columns to old ones by name: exact first, then trimmed and
    /// case-insensitive. `renames` holds `(old name, new name)` pairs for
    /// columns that were renamed between the files and win over name matches.
    pub fn from_headers(old: &[String], new: &[String], renames: &[(String, String)]) -> Self {
        let mapping = new
            .iter()
            .map(|new_name| {
                if let Some((old_name, _)) = renames.iter().find(|(_, n)| n == new_name) {
                    if let Some(i) = find_column(old, old_name) {
                        return Some(i);
                    }
                }
                find_column(old, new_name)
            })
            .collect();
        ColumnMapping(mapping)
    }

    /// Positional mapping for two identical headers.
    pub fn identity(width: usize) -> Self {
        ColumnMapping((0..width).map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, new_index: usize) -> Option<usize> {
        self.0.get(new_index).copied().flatten()
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.0
    }

    /// True when every new column sits at the same index in the old file.
    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, m)| *m == Some(i))
    }
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    if let Some(i) = headers.iter().position(|h| h == name) {
        return Some(i);
    }
    let target = name.trim().to_lowercase();
    headers.iter().position(|h| h.trim().to_lowercase() == target)
}

/// Pick a key column when the user did not name one.
///
/// Prefers a mapped new column whose lowercase name is in the priority list,
/// then falls back to the first mapped column. Returns `(old index, new index)`.
pub fn detect_key_columns(
    new: &[String],
    mapping: &ColumnMapping,
) -> Result<(Vec<usize>, Vec<usize>), DiffError> {
    for wanted in KEY_PRIORITY {
        for (i, name) in new.iter().enumerate() {
            if name.trim().to_lowercase() == wanted {
                if let Some(old) = mapping.get(i) {
                    debug!("detect_key_columns: using priority column {}", name);
                    return Ok((vec![old], vec![i]));
                }
            }
        }
    }
    for (i, name) in new.iter().enumerate() {
        if let Some(old) = mapping.get(i) {
            debug!("detect_key_columns: falling back to first common column {}", name);
            return Ok((vec![old], vec![i]));
        }
    }
    Err(DiffError::NoKeyColumns)
}

/// Resolve user-chosen key names (new-file names) to `(old indices, new indices)`.
pub fn resolve_key_columns(
    names: &[String],
    new: &[String],
    mapping: &ColumnMapping,
) -> Result<(Vec<usize>, Vec<usize>), DiffError> {
    let mut old_idx = Vec::with_capacity(names.len());
    let mut new_idx = Vec::with_capacity(names.len());
    for name in names {
        let n = find_column(new, name).ok_or_else(|| DiffError::UnknownKeyColumn {
            side: FileSide::New,
            name: name.clone(),
        })?;
        let o = mapping.get(n).ok_or_else(|| DiffError::UnknownKeyColumn {
            side: FileSide::Old,
            name: name.clone(),
        })?;
        new_idx.push(n);
        old_idx.push(o);
    }
    Ok((old_idx, new_idx))
}
