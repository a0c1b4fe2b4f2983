// src/merge/mod.rs
pub mod timestamp;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, WriterBuilder};
use rayon::prelude::*;
use std::{
    cmp::Ordering,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, instrument, warn};

use crate::batch::{discover_csv_files, file_name};
use crate::collapse::rewrite::write_atomic;
use crate::config::CollapseConfig;
use timestamp::{format_timestamp, parse_device_timestamp};

/// One single-header CSV, read into memory.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    /// Header names made unique, see [`unique_headers`].
    pub columns: Vec<String>,
    /// Rows padded to `columns.len()`.
    pub rows: Vec<Vec<String>>,
    /// Parsed first column of each row.
    pub timestamps: Vec<Option<NaiveDateTime>>,
}

/// Give blank names a positional label and suffix repeats with `.1`, `.2`…
pub fn unique_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        while let Some(n) = seen.get_mut(&candidate) {
            *n += 1;
            candidate = format!("{}.{}", base, n);
        }
        seen.insert(candidate.clone(), 0);
        out.push(candidate);
    }
    out
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow!("delimiter {:?} must be a single ASCII character", delimiter))
}

/// Load one file. `Ok(None)` means it was skipped for lack of data or of
/// any parseable timestamp.
#[instrument(level = "info", skip(path), fields(file = %path.display()))]
pub fn load_file(path: &Path, delimiter: char) -> Result<Option<LoadedFile>> {
    let name = file_name(path);
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let columns = unique_headers(
        rdr.headers()
            .with_context(|| format!("reading header of {}", name))?
            .iter(),
    );

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("CSV parse error in {} at record {}", name, idx))?;
        if record.len() > columns.len() {
            bail!(
                "{} record {} has {} fields, header has {}",
                name,
                idx,
                record.len(),
                columns.len()
            );
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    if columns.is_empty() || rows.is_empty() {
        warn!("No columns or rows found in '{}'. Skipping.", name);
        return Ok(None);
    }

    let timestamps: Vec<Option<NaiveDateTime>> =
        rows.iter().map(|r| parse_device_timestamp(&r[0])).collect();
    if timestamps.iter().all(Option::is_none) {
        warn!(
            "All values in '{}' for '{}' could not be parsed as datetime. Skipping.",
            columns[0], name
        );
        return Ok(None);
    }

    info!(rows = rows.len(), "Successfully loaded '{}'", name);
    Ok(Some(LoadedFile {
        name,
        columns,
        rows,
        timestamps,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    pub timestamp: Option<NaiveDateTime>,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<MergedRow>,
}

fn by_timestamp(a: &MergedRow, b: &MergedRow) -> Ordering {
    match (&a.timestamp, &b.timestamp) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Concatenate files on the union of their columns, then stable-sort by
/// each row's own timestamp with unparsed timestamps last.
pub fn merge_files(files: Vec<LoadedFile>) -> MergedTable {
    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for f in &files {
        for col in &f.columns {
            if !index.contains_key(col) {
                index.insert(col.clone(), columns.len());
                columns.push(col.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(files.iter().map(|f| f.rows.len()).sum());
    for f in files {
        let slots: Vec<usize> = f.columns.iter().map(|c| index[c]).collect();
        for (mut src, ts) in f.rows.into_iter().zip(f.timestamps) {
            src[0] = ts.as_ref().map(format_timestamp).unwrap_or_default();
            let mut cells = vec![String::new(); columns.len()];
            for (value, &slot) in src.into_iter().zip(&slots) {
                cells[slot] = value;
            }
            rows.push(MergedRow {
                timestamp: ts,
                cells,
            });
        }
    }

    rows.par_sort_by(by_timestamp);
    MergedTable { columns, rows }
}

/// Serialize `table` as delimited CSV and write it atomically to `out`.
pub fn write_merged(table: &MergedTable, out: &Path, delimiter: char) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(Vec::new());
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(&row.cells)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow!("flushing merged CSV: {}", e))?;
    write_atomic(out, &bytes)
}

fn is_same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub files_found: usize,
    pub files_loaded: usize,
    pub rows: usize,
    pub output: PathBuf,
}

/// Load every collapsed CSV under `cfg.data_dir` in parallel, merge and
/// sort by timestamp, write to `out`.
#[instrument(level = "info", skip(cfg, out), fields(dir = %cfg.data_dir.display()))]
pub fn merge_dir(cfg: &CollapseConfig, out: &Path) -> Result<MergeSummary> {
    let start = Instant::now();
    let files: Vec<PathBuf> = discover_csv_files(&cfg.data_dir)?
        .into_iter()
        .filter(|p| !is_same_path(p, out))
        .collect();
    info!("Found {} CSV file(s)", files.len());

    let loaded: Vec<LoadedFile> = files
        .par_iter()
        .filter_map(|path| match load_file(path, cfg.delimiter) {
            Ok(f) => f,
            Err(e) => {
                error!(file = %file_name(path), "Error processing: {:#}", e);
                None
            }
        })
        .collect();

    if loaded.is_empty() {
        bail!("No valid CSV files were processed in '{}'", cfg.data_dir.display());
    }

    let files_loaded = loaded.len();
    let table = merge_files(loaded);
    write_merged(&table, out, cfg.delimiter)?;

    info!(
        files = files_loaded,
        rows = table.rows.len(),
        elapsed = ?start.elapsed(),
        "Merged CSV file saved as '{}'",
        out.display()
    );
    Ok(MergeSummary {
        files_found: files.len(),
        files_loaded,
        rows: table.rows.len(),
        output: out.to_path_buf(),
    })
}
