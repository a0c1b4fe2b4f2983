// src/bin/merge_csv.rs

use anyhow::Result;
use sensorcsv::{config::CollapseConfig, init_logging, merge::merge_dir};
use std::{env, path::PathBuf};
use tracing::info;

fn main() -> Result<()> {
    init_logging("info");

    // usage: merge_csv [DATA_DIR] [OUTPUT_FILE]
    let mut args = env::args().skip(1);
    let dir_arg = args.next();
    let out = PathBuf::from(args.next().unwrap_or_else(|| "merged_output.csv".to_string()));

    let cfg = CollapseConfig::load(dir_arg.as_deref())?;
    let summary = merge_dir(&cfg, &out)?;
    info!(
        "Merging and sorting complete: {} of {} file(s), {} data rows → {}",
        summary.files_loaded,
        summary.files_found,
        summary.rows,
        summary.output.display()
    );
    Ok(())
}
