use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::records::TelemetryRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_RETAINED_FILES: u32 = 5;

struct WriterState {
    file: File,
    bytes_written: u64,
}

/// Single-writer rolling JSONL sink. One line per `TelemetryRecord`; rotates
/// to `<name>.1.jsonl`, `<name>.2.jsonl`, … once the active file passes
/// `max_file_bytes`, keeping at most `retained_files` rotated files.
pub struct TelemetrySink {
    base_path: PathBuf,
    max_file_bytes: u64,
    retained_files: u32,
    state: Mutex<WriterState>,
}

impl TelemetrySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, SinkError> {
        Self::with_rotation(dir, DEFAULT_MAX_FILE_BYTES, DEFAULT_RETAINED_FILES)
    }

    pub fn with_rotation<P: AsRef<Path>>(
        dir: P,
        max_file_bytes: u64,
        retained_files: u32,
    ) -> Result<Self, SinkError> {
        fs::create_dir_all(&dir)?;
        let base_path = dir.as_ref().join("proxy-telemetry.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(&base_path)?;
        let bytes_written = file.metadata()?.len();
        Ok(Self {
            base_path,
            max_file_bytes,
            retained_files,
            state: Mutex::new(WriterState { file, bytes_written }),
        })
    }

    /// Appends one record as a single JSON line, rotating first if the
    /// active file has grown past the configured threshold.
    pub fn record(&self, record: &TelemetryRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut state = self.state.lock();
        if state.bytes_written + line.len() as u64 > self.max_file_bytes {
            self.rotate(&mut state)?;
        }
        state.file.write_all(&line)?;
        state.bytes_written += line.len() as u64;
        Ok(())
    }

    fn rotate(&self, state: &mut WriterState) -> Result<(), SinkError> {
        for idx in (1..self.retained_files).rev() {
            let from = self.rotated_path(idx);
            let to = self.rotated_path(idx + 1);
            if from.exists() {
                let _ = fs::rename(&from, &to);
            }
        }
        if self.base_path.exists() {
            let _ = fs::rename(&self.base_path, self.rotated_path(1));
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)?;
        state.file = file;
        state.bytes_written = 0;
        Ok(())
    }

    fn rotated_path(&self, index: u32) -> PathBuf {
        let stem = self
            .base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("proxy-telemetry");
        self.base_path
            .with_file_name(format!("{stem}.{index}.jsonl"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> TelemetryRecord {
        TelemetryRecord::MemoryLimit {
            timestamp: Utc::now(),
            heap_mb: 1.0,
            threshold_mb: 512.0,
        }
    }

    #[test]
    fn records_append_as_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TelemetrySink::new(dir.path()).unwrap();
        sink.record(&sample()).unwrap();
        sink.record(&sample()).unwrap();

        let content = fs::read_to_string(dir.path().join("proxy-telemetry.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn rotates_when_threshold_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TelemetrySink::with_rotation(dir.path(), 64, 3).unwrap();
        for _ in 0..20 {
            sink.record(&sample()).unwrap();
        }
        assert!(dir.path().join("proxy-telemetry.1.jsonl").exists());
    }
}
