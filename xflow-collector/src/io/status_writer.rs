//! Status writer for the append-only status file.
//!
//! One JSON line per sweep, so a monitor can follow a long run without
//! waiting for the report.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xflow_fs::{Filesystem, FsError};

use crate::collector::SweepOutcome;

/// Errors from status writing.
#[derive(Debug, Error)]
pub enum StatusWriterError {
    #[error("failed to append status: {0}")]
    Append(#[source] FsError),

    #[error("failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single status line, written after each sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    /// Unix epoch seconds when the sweep ran.
    pub timestamp: u64,

    /// Sweep number (1-indexed).
    pub sweep: u64,

    /// Live flows enumerated by the sweep.
    pub scanned: u64,

    /// Flows finalized by the sweep.
    pub evicted: u64,

    /// Flows left in the live table.
    pub live_remaining: u64,

    /// Flows in the cold cache after the sweep.
    pub cold_total: u64,
}

impl StatusLine {
    pub fn from_sweep(timestamp: u64, sweep: u64, outcome: &SweepOutcome, cold_total: usize) -> Self {
        Self {
            timestamp,
            sweep,
            scanned: outcome.scanned as u64,
            evicted: outcome.evicted as u64,
            live_remaining: outcome.remaining as u64,
            cold_total: cold_total as u64,
        }
    }

    /// Serialize to a JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Writer for the append-only status file.
pub struct StatusWriter<F: Filesystem> {
    fs: F,
    path: PathBuf,
}

impl<F: Filesystem> StatusWriter<F> {
    pub fn new(fs: F, path: PathBuf) -> Self {
        Self { fs, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a status line, creating the file if needed.
    pub fn append(&self, status: &StatusLine) -> Result<(), StatusWriterError> {
        let line = format!("{}\n", status.to_json()?);
        self.fs
            .append_atomic(&self.path, line.as_bytes())
            .map_err(StatusWriterError::Append)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xflow_fs::{MockFilesystem, RealFilesystem};

    fn outcome() -> SweepOutcome {
        SweepOutcome {
            scanned: 10,
            evicted: 4,
            phantoms: 1,
            remaining: 6,
        }
    }

    // =========================================
    // StatusLine Tests
    // =========================================

    #[test]
    fn test_status_line_from_sweep() {
        let line = StatusLine::from_sweep(1704067200, 3, &outcome(), 25);
        assert_eq!(line.timestamp, 1704067200);
        assert_eq!(line.sweep, 3);
        assert_eq!(line.scanned, 10);
        assert_eq!(line.evicted, 4);
        assert_eq!(line.live_remaining, 6);
        assert_eq!(line.cold_total, 25);
    }

    #[test]
    fn test_status_line_to_json() {
        let json = StatusLine::from_sweep(1704067200, 1, &outcome(), 4)
            .to_json()
            .expect("json");
        assert_eq!(
            json,
            r#"{"timestamp":1704067200,"sweep":1,"scanned":10,"evicted":4,"live_remaining":6,"cold_total":4}"#
        );
    }

    #[test]
    fn test_status_line_missing_field() {
        let result = StatusLine::from_json(r#"{"timestamp":1000,"sweep":1}"#);
        assert!(result.is_err());
    }

    // =========================================
    // StatusWriter Tests
    // =========================================

    #[test]
    fn test_status_writer_appends_lines() {
        let fs = MockFilesystem::new();
        let path = PathBuf::from("/tmp/status.jsonl");
        let writer = StatusWriter::new(fs.clone(), path.clone());

        writer
            .append(&StatusLine::from_sweep(1000, 1, &outcome(), 4))
            .expect("append");
        writer
            .append(&StatusLine::from_sweep(1060, 2, &outcome(), 8))
            .expect("append");

        let content = String::from_utf8(fs.get_file(&path).expect("file")).expect("utf8");
        let lines: Vec<StatusLine> = content
            .lines()
            .map(|l| StatusLine::from_json(l).expect("parse"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].sweep, 2);
        assert_eq!(lines[1].cold_total, 8);
        assert_eq!(writer.path(), path.as_path());
    }

    #[test]
    fn test_status_writer_failure() {
        let fs = MockFilesystem::new();
        fs.fail_writes();
        let writer = StatusWriter::new(fs, PathBuf::from("/tmp/status.jsonl"));

        let result = writer.append(&StatusLine::from_sweep(1000, 1, &outcome(), 0));

        assert!(matches!(result, Err(StatusWriterError::Append(_))));
    }

    #[test]
    fn test_status_writer_real_filesystem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.jsonl");
        let writer = StatusWriter::new(RealFilesystem, path.clone());

        for sweep in 1..=3 {
            writer
                .append(&StatusLine::from_sweep(1000 + sweep, sweep, &outcome(), 0))
                .expect("append");
        }

        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().count(), 3);
    }
}
