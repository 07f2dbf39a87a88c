//! Output files.
//!
//! - the CSV report, written once at the end of a run
//! - the optional append-only status file, one line per sweep

pub mod output_writer;
pub mod status_writer;

pub use output_writer::{OutputWriter, OutputWriterError};
pub use status_writer::{StatusLine, StatusWriter, StatusWriterError};
