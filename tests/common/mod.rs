//! Shared helpers for the integration tests.

#![allow(dead_code)]

use csvdiff::parser::header::{read_header, resolve_key_columns};
use csvdiff::{diff_to_vec, ColumnMapping, DiffRow, DiffStats, MemorySource, Message, RunConfig};
use std::sync::Arc;

/// Build a run over two in-memory files, keyed by the named new-file columns.
/// Headers are read and mapped the same way the command-line host does it.
pub fn config_for(old: &str, new: &str, keys: &[&str], renames: &[(&str, &str)]) -> RunConfig {
    let old_src = Arc::new(MemorySource::new(old.as_bytes().to_vec()));
    let new_src = Arc::new(MemorySource::new(new.as_bytes().to_vec()));
    let old_headers = read_header(old_src.as_ref(), ',').expect("old header");
    let new_headers = read_header(new_src.as_ref(), ',').expect("new header");
    let renames: Vec<(String, String)> = renames
        .iter()
        .map(|(o, n)| (o.to_string(), n.to_string()))
        .collect();
    let mapping = ColumnMapping::from_headers(&old_headers, &new_headers, &renames);
    let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    let (keys_old, keys_new) = resolve_key_columns(&names, &new_headers, &mapping).expect("keys");
    let identical = old_headers == new_headers && mapping.is_identity();
    RunConfig::new(old_src, new_src, keys_old, keys_new, mapping)
        .with_headers_identical(identical)
}

pub fn run_config(config: RunConfig) -> (DiffStats, Vec<DiffRow>) {
    let (stats, messages) = diff_to_vec(config).expect("diff run");
    (stats, rows_of(&messages))
}

pub fn run(old: &str, new: &str, keys: &[&str]) -> (DiffStats, Vec<DiffRow>) {
    run_config(config_for(old, new, keys, &[]))
}

pub fn rows_of(messages: &[Message]) -> Vec<DiffRow> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Batch { results } => Some(results.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn stats(added: u64, removed: u64, modified: u64) -> DiffStats {
    DiffStats {
        added,
        removed,
        modified,
    }
}

/// A deterministic CSV with `rows` data lines. `salt` changes the value column
/// of every `salt`-th row so two tables can be made to differ predictably.
pub fn generated_csv(rows: usize, start: usize, salt: usize) -> String {
    let mut out = String::from("id,name,value\n");
    for i in start..start + rows {
        let value = if salt > 0 && i % salt == 0 { i * 7 + 1 } else { i * 7 };
        out.push_str(&format!("{},row-{},{}\n", i, i, value));
    }
    out
}
