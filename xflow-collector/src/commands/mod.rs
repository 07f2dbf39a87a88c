//! Command orchestration.

pub mod collect;

pub use collect::{execute_collect, CollectResult};

use thiserror::Error;
use xflow_bpf::{BpfError, TableError};
use xflow_clock::ClockError;
use xflow_fs::FsError;

use crate::cli::CliError;
use crate::collector::CollectorError;
use crate::io::OutputWriterError;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] FsError),

    #[error("output error: {0}")]
    Output(#[from] OutputWriterError),

    #[error("collector error: {0}")]
    Collector(#[from] CollectorError),

    #[error("flow table error: {0}")]
    Table(#[from] TableError),

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("BPF error: {0}")]
    Bpf(#[from] BpfError),

    #[error("teardown failed: {0}")]
    Teardown(#[source] BpfError),

    #[error("no network interface found")]
    NoInterface,
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;
