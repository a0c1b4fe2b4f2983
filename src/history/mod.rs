// src/history/mod.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use glob::{glob, Pattern};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::HashSet,
    fs,
    fs::File,
    path::PathBuf,
    sync::Arc,
};
use tracing::debug;

/// Event name written once a file's header band has been collapsed.
pub const COLLAPSED: &str = "collapsed";

/// Processed-manifest backed by one small Parquet file per event.
pub struct History {
    history_dir: PathBuf,
}

impl History {
    /// Open the manifest at `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {:?}", &history_dir))?;
        Ok(Self { history_dir })
    }

    /// Record `event` for `file_name`.
    /// Writes a single-row Parquet file named `<file>_<event>_<ts>.parquet`.
    pub fn record_event(
        &self,
        file_name: &str,
        event: &str,
        output_rows: u64,
        output_bytes: u64,
    ) -> Result<PathBuf> {
        let ts = Utc::now().timestamp_micros();
        let path = self
            .history_dir
            .join(format!("{}_{}_{}.parquet", file_name, event, ts));

        let schema = Arc::new(Schema::new(vec![
            Field::new("file_name", DataType::Utf8, false),
            Field::new("event", DataType::Utf8, false),
            Field::new("output_rows", DataType::UInt64, false),
            Field::new("output_bytes", DataType::UInt64, false),
            Field::new(
                "event_time",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ]));

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![file_name.to_string()])),
            Arc::new(StringArray::from(vec![event.to_string()])),
            Arc::new(UInt64Array::from(vec![output_rows])),
            Arc::new(UInt64Array::from(vec![output_bytes])),
            Arc::new(TimestampMicrosecondArray::from_iter_values(vec![ts])),
        ];

        let batch = RecordBatch::try_new(schema.clone(), columns)
            .context("building history record batch")?;
        let file =
            File::create(&path).with_context(|| format!("creating history file {:?}", &path))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("creating Arrow writer for history")?;
        writer.write(&batch).context("writing history batch")?;
        writer.close().context("closing history writer")?;

        debug!(file = file_name, event, path = %path.display(), "recorded history event");
        Ok(path)
    }

    /// All distinct file names that have `event` recorded, taken from the
    /// `<file>_<event>_<ts>.parquet` filenames.
    pub fn load_event_names(&self, event: &str) -> Result<HashSet<String>> {
        let mut set = HashSet::new();
        let pattern = format!(
            "{}/*_{}_*.parquet",
            Pattern::escape(&self.history_dir.to_string_lossy()),
            Pattern::escape(event)
        );
        let marker = format!("_{}_", event);
        for entry in glob(&pattern)?.flatten() {
            if let Some(stem) = entry.file_stem().and_then(|s| s.to_str()) {
                if let Some(idx) = stem.rfind(&marker) {
                    set.insert(stem[..idx].to_string());
                }
            }
        }
        Ok(set)
    }
}
