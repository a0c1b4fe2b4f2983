use anyhow::Result;
use sensorcsv::{batch::run_batch, config::CollapseConfig, init_logging};
use std::env;
use tracing::info;

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    init_logging("info");
    info!("startup");

    // ─── 2) config: defaults → $SENSORCSV_CONFIG → env → argv ────────
    // usage: sensorcsv [DATA_DIR]
    let dir_arg = env::args().nth(1);
    let cfg = CollapseConfig::load(dir_arg.as_deref())?;
    info!(
        dir = %cfg.data_dir.display(),
        max_cols = cfg.max_cols,
        band = ?(cfg.band_start + 1..=cfg.band_end),
        "collapsing header band"
    );

    // ─── 3) collapse every file; aborts come back as Err ─────────────
    let report = run_batch(&cfg)?;

    info!(
        "done: {} collapsed, {} skipped, {} already collapsed, {} failed",
        report.collapsed(),
        report.skipped(),
        report.already_collapsed(),
        report.failed()
    );
    Ok(())
}
