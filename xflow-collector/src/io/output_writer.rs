//! Report writer.

use std::path::{Path, PathBuf};

use thiserror::Error;
use xflow_fs::{Filesystem, FsError};
use xflow_reporter::Report;

/// Errors from output writing.
#[derive(Debug, Error)]
pub enum OutputWriterError {
    #[error("failed to create output directory: {0}")]
    CreateDir(#[source] FsError),

    #[error("failed to write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: FsError,
    },
}

/// Writes the compiled report to its destination in a single atomic write.
pub struct OutputWriter<'a, F: Filesystem> {
    fs: &'a F,
    path: &'a Path,
}

impl<'a, F: Filesystem> OutputWriter<'a, F> {
    pub fn new(fs: &'a F, path: &'a Path) -> Self {
        Self { fs, path }
    }

    /// Ensure the report's parent directory exists.
    pub fn ensure_dir(&self) -> Result<(), OutputWriterError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => self
                .fs
                .create_dir_all(dir)
                .map_err(OutputWriterError::CreateDir),
            _ => Ok(()),
        }
    }

    /// Write the report (header first) and return its path.
    pub fn write_report(&self, report: &Report) -> Result<PathBuf, OutputWriterError> {
        self.ensure_dir()?;
        self.fs
            .write_atomic(self.path, report.to_csv().as_bytes())
            .map_err(|e| OutputWriterError::Write {
                file: self.path.display().to_string(),
                source: e,
            })?;
        Ok(self.path.to_path_buf())
    }
}
