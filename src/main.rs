// csvdiff command-line host.
// Reads both headers, lines up columns, picks key columns, runs the engine on
// its worker thread and writes every diff row as one JSON line.

mod logger;
mod progress;

use clap::{CommandFactory, Parser};
use csvdiff::parser::header::{
    detect_delimiter, detect_key_columns, read_header, read_header_line, resolve_key_columns,
};
use csvdiff::{open_source, ColumnMapping, DiffStats, Message, RunConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Instant;
use tracing::{debug, info};

// Command-line flags and positional arguments.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging (disables the progress bar).
    #[arg(long)]
    debug: bool,

    /// Key column name in the new file; repeat for a composite key.
    /// Auto-detected when omitted.
    #[arg(short, long = "key")]
    keys: Vec<String>,

    /// Delimiter for both files (auto-detected from each header when omitted).
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Delimiter for the old file only.
    #[arg(long)]
    old_delimiter: Option<char>,

    /// Delimiter for the new file only.
    #[arg(long)]
    new_delimiter: Option<char>,

    /// Column renamed between the files, as OLD=NEW. Repeatable.
    #[arg(long = "rename", value_parser = parse_rename)]
    renames: Vec<(String, String)>,

    /// Read chunk size in MiB.
    #[arg(long, default_value_t = 8)]
    chunk_size_mb: usize,

    /// Rows per emitted batch.
    #[arg(long, default_value_t = csvdiff::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Always compare cells, even when the headers are identical.
    #[arg(long)]
    no_fast_path: bool,

    /// Use positional reads instead of memory-mapping the inputs.
    #[arg(long)]
    no_mmap: bool,

    /// Write run statistics as JSON to this file.
    #[arg(long)]
    stats_json: Option<String>,

    /// Old file path.
    old_file: String,

    /// New file path.
    new_file: String,

    /// Output file for diff rows (JSON lines). If omitted, prints to stdout.
    output: Option<String>,
}

fn parse_rename(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
            Ok((old.trim().to_string(), new.trim().to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got '{}'", s)),
    }
}

// Equal row hashes only mean "unchanged" when both files lay their columns
// out the same way, which a rename can break even between equal headers.
fn fast_path_enabled(
    old_headers: &[String],
    new_headers: &[String],
    mapping: &ColumnMapping,
    disabled: bool,
) -> bool {
    !disabled && old_headers == new_headers && mapping.is_identity()
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let wall_start = Instant::now();
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();

    logger::init(args.debug);
    debug!("main: old file {}", args.old_file);
    debug!("main: new file {}", args.new_file);

    let old = open_source(&args.old_file, !args.no_mmap)?;
    let new = open_source(&args.new_file, !args.no_mmap)?;

    let old_delim = args
        .old_delimiter
        .or(args.delimiter)
        .map(Ok)
        .unwrap_or_else(|| read_header_line(old.as_ref()).map(|l| detect_delimiter(&l)))?;
    let new_delim = args
        .new_delimiter
        .or(args.delimiter)
        .map(Ok)
        .unwrap_or_else(|| read_header_line(new.as_ref()).map(|l| detect_delimiter(&l)))?;
    debug!("main: delimiters old={:?} new={:?}", old_delim, new_delim);

    let old_headers = read_header(old.as_ref(), old_delim)?;
    let new_headers = read_header(new.as_ref(), new_delim)?;
    let mapping = ColumnMapping::from_headers(&old_headers, &new_headers, &args.renames);
    for (i, name) in new_headers.iter().enumerate() {
        if mapping.get(i).is_none() {
            info!("column '{}' is new; its old values compare as empty", name);
        }
    }

    let (keys_old, keys_new) = if args.keys.is_empty() {
        detect_key_columns(&new_headers, &mapping)?
    } else {
        resolve_key_columns(&args.keys, &new_headers, &mapping)?
    };
    let key_names: Vec<&str> = keys_new.iter().map(|&i| new_headers[i].as_str()).collect();
    info!("key columns: {}", key_names.join(", "));

    let identical = fast_path_enabled(&old_headers, &new_headers, &mapping, args.no_fast_path);
    let config = RunConfig::new(old, new, keys_old, keys_new, mapping)
        .with_delimiters(old_delim, new_delim)
        .with_chunk_size(args.chunk_size_mb.max(1) * 1024 * 1024)
        .with_batch_size(args.batch_size)
        .with_headers_identical(identical);

    let mut out: Box<dyn Write> = if let Some(path) = &args.output {
        Box::new(BufWriter::new(File::create(path)?))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    let progress = progress::RunProgress::new(!args.debug);
    let worker = csvdiff::spawn(config)?;
    let mut stats: Option<DiffStats> = None;
    for message in worker {
        match message {
            Message::Status { message, progress: p } => {
                debug!("status: {} ({}%)", message, p);
                progress.status(&message, p);
            }
            Message::Progress { value } => progress.set(value),
            Message::Batch { results } => {
                for row in &results {
                    serde_json::to_writer(&mut out, row)?;
                    out.write_all(b"\n")?;
                }
            }
            Message::Done { stats: s } => {
                progress.finish();
                stats = Some(s);
            }
            Message::Error { error } => {
                progress.abandon();
                out.flush()?;
                return Err(error.into());
            }
        }
    }
    out.flush()?;

    let stats = stats.ok_or("diff worker exited without a result")?;
    let elapsed = wall_start.elapsed();

    if let Some(path) = args.stats_json.as_ref() {
        let report = serde_json::json!({
            "added": stats.added,
            "removed": stats.removed,
            "modified": stats.modified,
            "total": stats.total(),
            "elapsed_ms": elapsed.as_millis(),
        });
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    let sep = "=".repeat(60);
    {
        let mut stderr = io::stderr();
        writeln!(stderr, "\n{}\nSUMMARY\n{}", sep, sep)?;
        writeln!(stderr, "Added:    {}", stats.added)?;
        writeln!(stderr, "Removed:  {}", stats.removed)?;
        writeln!(stderr, "Modified: {}", stats.modified)?;
        writeln!(stderr, "Total:    {}", stats.total())?;
        writeln!(stderr, "{}", sep)?;
    }
    debug!("main: finished in {:?}", elapsed);
    Ok(())
}
