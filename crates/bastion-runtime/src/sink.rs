//! Persisted history: the append-only JSONL execution log and JSON
//! snapshot files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use bastion_contracts::error::{BastionError, BastionResult};
use bastion_core::traits::RecordSink;

/// One JSON object per line, opened in append mode for every write.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    lines: Mutex<usize>,
}

impl JsonlSink {
    /// Open (or create) the log at `path`, counting existing records.
    pub fn open(path: impl Into<PathBuf>) -> BastionResult<Self> {
        let path = path.into();
        let existing = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut count = 0;
            for line in reader.lines() {
                if !line?.trim().is_empty() {
                    count += 1;
                }
            }
            count
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            0
        };
        Ok(Self {
            path,
            lines: Mutex::new(existing),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, in append order.
    pub fn read_all(&self) -> BastionResult<Vec<serde_json::Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(&line)?);
            }
        }
        Ok(records)
    }
}

impl RecordSink for JsonlSink {
    fn append(&self, record: &serde_json::Value) -> BastionResult<()> {
        let mut lines = self.lines.lock().map_err(|e| BastionError::Io {
            reason: format!("execution log lock poisoned: {e}"),
        })?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        *lines += 1;
        debug!(path = %self.path.display(), records = *lines, "record appended");
        Ok(())
    }

    fn len(&self) -> usize {
        self.lines.lock().map(|n| *n).unwrap_or(0)
    }
}

/// Overwrite `path` with `value` as pretty JSON, via a sibling temp file.
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> BastionResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
