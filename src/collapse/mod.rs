// src/collapse/mod.rs
pub mod header;
pub mod rewrite;
pub mod tokenize;

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::{debug, info, instrument, warn};

use crate::config::CollapseConfig;
use header::merge_header_band;
use rewrite::{render_document, write_atomic};
use tokenize::tokenize_text;

/// A file after its header band has been collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedDocument {
    /// Synthetic header, exactly `max_cols` fields.
    pub header: Vec<String>,
    /// Rows from `band_end` onward, post pad/truncate.
    pub body: Vec<Vec<String>>,
}

impl CollapsedDocument {
    pub fn render(&self, delimiter: char) -> String {
        render_document(&self.header, &self.body, delimiter)
    }

    /// Rows in the rewritten file (header included).
    pub fn output_rows(&self) -> usize {
        1 + self.body.len()
    }
}

/// Result of collapsing in-memory text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collapse {
    /// Not enough lines to hold the header band.
    TooShort { lines: usize },
    Collapsed(CollapsedDocument),
}

/// Tokenize `text`, merge its header band and keep the data body.
pub fn collapse_text(text: &str, cfg: &CollapseConfig) -> Collapse {
    let mut matrix = tokenize_text(text, cfg.delimiter, cfg.max_cols);
    if matrix.len() < cfg.min_lines() {
        return Collapse::TooShort {
            lines: matrix.len(),
        };
    }

    let header = merge_header_band(&matrix, cfg.band_start..cfg.band_end, cfg.max_cols);
    let body = matrix.split_off(cfg.band_end);
    Collapse::Collapsed(CollapsedDocument { header, body })
}

/// What happened to one file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Collapsed {
        input_lines: usize,
        output_rows: usize,
        output_bytes: u64,
    },
    /// Fewer lines than the header band needs; file not touched.
    Skipped { lines: usize },
    /// Already listed in the processed manifest; file not touched.
    AlreadyCollapsed,
}

/// Read `path`, collapse it and atomically write the result back in place.
///
/// Not idempotent: a second call treats the merged header plus the first
/// data rows as a fresh header band. Callers guard with the manifest.
#[instrument(level = "info", skip(path, cfg), fields(file = %path.display()))]
pub fn collapse_file(path: &Path, cfg: &CollapseConfig) -> Result<FileOutcome> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;

    let doc = match collapse_text(&text, cfg) {
        Collapse::TooShort { lines } => {
            warn!(
                lines,
                expected = cfg.min_lines(),
                "too few rows for header band, skipping"
            );
            return Ok(FileOutcome::Skipped { lines });
        }
        Collapse::Collapsed(doc) => doc,
    };

    debug!(
        preview = ?doc.header.iter().take(10).collect::<Vec<_>>(),
        fields = doc.header.len(),
        "merged header"
    );

    let rendered = doc.render(cfg.delimiter);
    write_atomic(path, rendered.as_bytes())?;

    let input_lines = doc.body.len() + cfg.band_end;
    info!(
        input_lines,
        output_rows = doc.output_rows(),
        "collapsed header rows {}-{}",
        cfg.band_start + 1,
        cfg.band_end
    );
    Ok(FileOutcome::Collapsed {
        input_lines,
        output_rows: doc.output_rows(),
        output_bytes: rendered.len() as u64,
    })
}
