// src/batch.rs

use anyhow::{bail, Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, instrument, warn};

use crate::collapse::{
    collapse_file,
    tokenize::{raw_width, split_lines},
    FileOutcome,
};
use crate::config::CollapseConfig;
use crate::history::{History, COLLAPSED};

/// List the `.csv` files (any extension case) directly inside `dir`, sorted.
///
/// Errors when the directory is missing or holds no candidates, since every
/// tool built on this aborts before touching anything in those cases.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Folder '{}' does not exist", dir.display());
    }

    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };
    let mut files: Vec<PathBuf> = glob_with(&pattern, options)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        bail!("No CSV files found in '{}'", dir.display());
    }
    Ok(files)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Widest raw line of a file, before pad/truncate.
fn widest_line(path: &Path, delimiter: char) -> Result<usize> {
    let text = fs::read_to_string(path)?;
    Ok(split_lines(&text)
        .into_iter()
        .map(|line| raw_width(line, delimiter))
        .max()
        .unwrap_or(0))
}

/// Require at least one candidate whose widest line is exactly `max_cols`
/// fields; anything else means the configured width is wrong for this data.
pub fn validate_width(files: &[PathBuf], cfg: &CollapseConfig) -> Result<()> {
    let mut seen = Vec::with_capacity(files.len());
    for path in files {
        match widest_line(path, cfg.delimiter) {
            Ok(width) if width == cfg.max_cols => return Ok(()),
            Ok(width) => seen.push(width),
            Err(e) => warn!(file = %file_name(path), "width check could not read file: {}", e),
        }
    }
    seen.sort_unstable();
    seen.dedup();
    bail!(
        "configuration error: no file in '{}' is {} fields wide (widths seen: {:?})",
        cfg.data_dir.display(),
        cfg.max_cols,
        seen
    )
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Result<FileOutcome>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&Result<FileOutcome>) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn collapsed(&self) -> usize {
        self.count(|o| matches!(o, Ok(FileOutcome::Collapsed { .. })))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Ok(FileOutcome::Skipped { .. })))
    }

    pub fn already_collapsed(&self) -> usize {
        self.count(|o| matches!(o, Ok(FileOutcome::AlreadyCollapsed)))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }
}

/// Collapse every candidate CSV in `cfg.data_dir`, one file at a time.
///
/// Returns `Err` only for batch-level aborts (bad config, missing directory,
/// no candidates, width mismatch); per-file failures land in the report.
#[instrument(level = "info", skip(cfg), fields(dir = %cfg.data_dir.display()))]
pub fn run_batch(cfg: &CollapseConfig) -> Result<BatchReport> {
    cfg.validate()?;
    let files = discover_csv_files(&cfg.data_dir)?;
    info!(
        "Found {} CSV file(s): {:?}",
        files.len(),
        files.iter().map(|p| file_name(p)).collect::<Vec<_>>()
    );

    if cfg.validate_width {
        validate_width(&files, cfg)?;
    }

    let history = if cfg.use_history {
        Some(History::new(cfg.history_dir())?)
    } else {
        None
    };
    let done = match &history {
        Some(h) => h.load_event_names(COLLAPSED)?,
        None => Default::default(),
    };

    let start = Instant::now();
    let mut report = BatchReport::default();
    for path in files {
        let name = file_name(&path);
        let outcome = if done.contains(&name) {
            info!(file = %name, "already collapsed, leaving as is");
            Ok(FileOutcome::AlreadyCollapsed)
        } else {
            process_one(&path, &name, cfg, history.as_ref())
        };
        if let Err(e) = &outcome {
            error!(file = %name, "Error processing '{}': {:#}", name, e);
        }
        report.files.push(FileReport { path, outcome });
    }

    info!(
        collapsed = report.collapsed(),
        skipped = report.skipped(),
        already = report.already_collapsed(),
        failed = report.failed(),
        elapsed = ?start.elapsed(),
        "Processing complete. Processed {} file(s).",
        report.files.len()
    );
    Ok(report)
}

fn process_one(
    path: &Path,
    name: &str,
    cfg: &CollapseConfig,
    history: Option<&History>,
) -> Result<FileOutcome> {
    let outcome = collapse_file(path, cfg)?;
    if let (
        Some(history),
        FileOutcome::Collapsed {
            output_rows,
            output_bytes,
            ..
        },
    ) = (history, &outcome)
    {
        history
            .record_event(name, COLLAPSED, *output_rows as u64, *output_bytes)
            .with_context(|| {
                format!("'{}' was collapsed but could not be recorded in history", name)
            })?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,sensorcsv=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// Nine header lines, the band padded to `width` fields, then `data_rows`.
    fn device_file(width: usize, data_rows: usize) -> String {
        let wide = vec!["u"; width].join(";");
        let mut lines = vec![
            "preamble".to_string(),
            "preamble".to_string(),
            "preamble".to_string(),
            wide,
            "Temp;Hum".to_string(),
            "".to_string(),
            ";".to_string(),
            "id1;id2".to_string(),
            "".to_string(),
        ];
        for i in 0..data_rows {
            lines.push(format!("07.10.2019 10:{:02};1;2", i));
        }
        lines.join("\n")
    }

    #[test]
    fn missing_directory_aborts() {
        let dir = tempdir().unwrap();
        let cfg = CollapseConfig::for_dir(dir.path().join("nope"));
        let err = run_batch(&cfg).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn directory_without_csv_aborts() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("notes.txt"), "x")?;
        let err = run_batch(&CollapseConfig::for_dir(dir.path())).unwrap_err();
        assert!(err.to_string().contains("No CSV files"));
        Ok(())
    }

    #[test]
    fn discovery_is_case_insensitive() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.csv"), "")?;
        fs::write(dir.path().join("B.CSV"), "")?;
        fs::write(dir.path().join("c.Csv"), "")?;
        fs::write(dir.path().join("d.csv.bak"), "")?;
        fs::create_dir(dir.path().join("sub.csv"))?;

        let names: Vec<String> = discover_csv_files(dir.path())?
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["B.CSV", "a.csv", "c.Csv"]);
        Ok(())
    }

    #[test]
    fn width_mismatch_aborts_before_touching_files() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let path = dir.path().join("day.csv");
        let original = device_file(20, 3);
        fs::write(&path, &original)?;

        let err = run_batch(&CollapseConfig::for_dir(dir.path())).unwrap_err();
        assert!(err.to_string().contains("configuration error"));
        assert_eq!(fs::read_to_string(&path)?, original);
        Ok(())
    }

    #[test]
    fn batch_isolates_skips_and_failures() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let good = dir.path().join("20191007.csv");
        let short = dir.path().join("short.csv");
        let bad = dir.path().join("broken.csv");
        fs::write(&good, device_file(174, 5))?;
        fs::write(&short, "a;b\nc;d\n")?;
        fs::write(&bad, [b'x', 0xff, b'\n'])?;

        let report = run_batch(&CollapseConfig::for_dir(dir.path()))?;
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.collapsed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);

        let out = fs::read_to_string(&good)?;
        let header: Vec<&str> = out.lines().next().unwrap_or_default().split(';').collect();
        assert_eq!(header.len(), 174);
        assert_eq!(header[0], "u Temp id1");
        assert_eq!(header[1], "u Hum id2");
        assert_eq!(header[2], "u");
        assert_eq!(out.lines().count(), 6);
        assert_eq!(fs::read_to_string(&short)?, "a;b\nc;d\n");
        Ok(())
    }

    #[test]
    fn second_run_is_a_no_op() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let path = dir.path().join("day.csv");
        fs::write(&path, device_file(174, 12))?;
        let cfg = CollapseConfig::for_dir(dir.path());

        let first = run_batch(&cfg)?;
        assert_eq!(first.collapsed(), 1);
        let after_first = fs::read(&path)?;

        let second = run_batch(&cfg)?;
        assert_eq!(second.already_collapsed(), 1);
        assert_eq!(second.collapsed(), 0);
        assert_eq!(fs::read(&path)?, after_first);
        Ok(())
    }

    #[test]
    fn second_run_is_a_no_op_in_bracketed_dir() -> Result<()> {
        init_test_logging();
        let root = tempdir()?;
        let dir = root.path().join("run[1]");
        fs::create_dir(&dir)?;
        let path = dir.join("day.csv");
        fs::write(&path, device_file(174, 12))?;
        let cfg = CollapseConfig::for_dir(&dir);

        assert_eq!(run_batch(&cfg)?.collapsed(), 1);
        let after_first = fs::read(&path)?;

        let second = run_batch(&cfg)?;
        assert_eq!(second.already_collapsed(), 1);
        assert_eq!(second.collapsed(), 0);
        assert_eq!(fs::read(&path)?, after_first);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn collapse_keeps_file_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir()?;
        let path = dir.path().join("day.csv");
        fs::write(&path, device_file(174, 3))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        assert_eq!(run_batch(&CollapseConfig::for_dir(dir.path()))?.collapsed(), 1);
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }

    #[test]
    fn cr_only_file_is_collapsed() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("mac.csv");
        fs::write(&path, device_file(174, 4).replace('\n', "\r"))?;

        let report = run_batch(&CollapseConfig::for_dir(dir.path()))?;
        assert_eq!(report.collapsed(), 1);
        let out = fs::read_to_string(&path)?;
        assert_eq!(out.lines().count(), 5);
        assert!(out.starts_with("u Temp id1;u Hum id2;u;"));
        Ok(())
    }

    #[test]
    fn without_history_a_second_run_rewrites_again() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("day.csv");
        fs::write(&path, device_file(174, 12))?;
        let cfg = CollapseConfig {
            use_history: false,
            ..CollapseConfig::for_dir(dir.path())
        };

        run_batch(&cfg)?;
        let after_first = fs::read(&path)?;
        let second = run_batch(&cfg)?;
        assert_eq!(second.collapsed(), 1);
        assert_ne!(fs::read(&path)?, after_first);
        assert!(!dir.path().join(".history").exists());
        Ok(())
    }
}
