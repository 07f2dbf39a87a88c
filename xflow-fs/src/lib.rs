//! Filesystem abstraction for xflow.
//!
//! This crate provides the `Filesystem` trait used for the final report
//! (written once, atomically) and the append-only sweep status log, with a
//! real and an in-memory implementation.

pub mod filesystem;

pub use filesystem::{Filesystem, FsError, MockFilesystem, RealFilesystem};
