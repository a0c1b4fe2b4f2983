// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Env var naming an optional YAML config file.
pub const CONFIG_ENV: &str = "SENSORCSV_CONFIG";
pub const DATA_DIR_ENV: &str = "SENSORCSV_DATA_DIR";
pub const MAX_COLS_ENV: &str = "SENSORCSV_MAX_COLS";

/// Field width of the device family this tool was written for.
pub const DEFAULT_MAX_COLS: usize = 174;

/// Settings for one collapse/check/merge run over a directory of CSV files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    pub data_dir: PathBuf,
    /// Every row is padded or truncated to exactly this many fields.
    pub max_cols: usize,
    /// 0-based first row of the fragmented header.
    pub band_start: usize,
    /// 0-based exclusive end of the header; data starts here.
    pub band_end: usize,
    pub delimiter: char,
    /// Processed-manifest location; `<data_dir>/.history` when unset.
    pub history_dir: Option<PathBuf>,
    pub validate_width: bool,
    pub use_history: bool,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data1"),
            max_cols: DEFAULT_MAX_COLS,
            band_start: 3,
            band_end: 9,
            delimiter: ';',
            history_dir: None,
            validate_width: true,
            use_history: true,
        }
    }
}

impl CollapseConfig {
    /// Convenience constructor used by tests and library callers.
    pub fn for_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a YAML document; missing keys keep their defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s).context("parsing YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Defaults, then `$SENSORCSV_CONFIG`, then env overrides, then the
    /// positional data-dir argument if one was given.
    pub fn load(dir_arg: Option<&str>) -> Result<Self> {
        let mut cfg = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = env::var(MAX_COLS_ENV) {
            cfg.max_cols = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got {:?}", MAX_COLS_ENV, raw))?;
        }
        if let Some(dir) = dir_arg {
            cfg.data_dir = PathBuf::from(dir);
        }

        cfg.validate()?;
        debug!(?cfg, "loaded config");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cols == 0 {
            bail!("max_cols must be greater than zero");
        }
        if self.band_start >= self.band_end {
            bail!(
                "header band is empty: band_start ({}) must be below band_end ({})",
                self.band_start,
                self.band_end
            );
        }
        Ok(())
    }

    /// Minimum number of lines a file needs before it can be collapsed.
    pub fn min_lines(&self) -> usize {
        self.band_end
    }

    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(".history"))
    }
}
