// src/duplicates.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

use crate::batch::{discover_csv_files, file_name};
use crate::config::CollapseConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateHeader {
    pub name: String,
    pub count: usize,
}

/// Header statistics for one collapsed file.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub file: String,
    pub header_count: usize,
    /// Non-empty names appearing more than once, most frequent first.
    pub duplicates: Vec<DuplicateHeader>,
    /// Columns whose merged name is empty.
    pub unnamed: usize,
    pub first_headers: Vec<String>,
}

impl DuplicateReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// Count repeated names in a single header line.
pub fn analyze_header(file: &str, header_line: &str, delimiter: char) -> DuplicateReport {
    let headers: Vec<&str> = header_line.trim_end_matches(&['\r', '\n'][..]).split(delimiter).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for h in &headers {
        *counts.entry(*h).or_default() += 1;
    }
    let unnamed = counts.remove("").unwrap_or(0);

    let mut duplicates: Vec<DuplicateHeader> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| DuplicateHeader {
            name: name.to_string(),
            count,
        })
        .collect();
    duplicates.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    DuplicateReport {
        file: file.to_string(),
        header_count: headers.len(),
        duplicates,
        unnamed,
        first_headers: headers.iter().take(10).map(|s| s.to_string()).collect(),
    }
}

/// Read only the first line of `path` and analyze it.
#[instrument(level = "debug", skip(path), fields(file = %path.display()))]
pub fn check_file(path: &Path, delimiter: char) -> Result<DuplicateReport> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut first = String::new();
    BufReader::new(file)
        .read_line(&mut first)
        .with_context(|| format!("reading header of {}", path.display()))?;
    Ok(analyze_header(&file_name(path), &first, delimiter))
}

/// Check every candidate file; per-file errors are logged and returned
/// alongside the successful reports.
pub fn check_dir(cfg: &CollapseConfig) -> Result<Vec<(PathBuf, Result<DuplicateReport>)>> {
    let files = discover_csv_files(&cfg.data_dir)?;
    info!("Found {} CSV file(s)", files.len());

    let results: Vec<_> = files
        .into_iter()
        .map(|path| {
            let res = check_file(&path, cfg.delimiter);
            match &res {
                Ok(r) if r.has_duplicates() => {
                    for d in &r.duplicates {
                        warn!(file = %r.file, "'{}' appears {} times", d.name, d.count);
                    }
                }
                Ok(r) => info!(file = %r.file, headers = r.header_count, "no duplicate headers"),
                Err(e) => error!(file = %file_name(&path), "Error processing: {:#}", e),
            }
            (path, res)
        })
        .collect();

    info!("Duplicate check complete. Processed {} file(s).", results.len());
    Ok(results)
}
