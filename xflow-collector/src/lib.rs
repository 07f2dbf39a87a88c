//! xflow collector.
//!
//! This crate drives a collection run: it reconciles the time base, attaches
//! the classifier, sweeps idle flows into the cold cache, drains everything on
//! exit, compiles the report and detaches.

pub mod cli;
pub mod collector;
pub mod commands;
pub mod context;
pub mod exit;
pub mod io;
pub mod logger;
pub mod signal;
pub mod sleeper;

pub use cli::{
    default_interface, parse_from, parse_route_table, resolve_interface, Cli, CliError,
    CollectArgs, DedupArg, DEFAULT_AGGREGATE_SECS, DEFAULT_OUTPUT, DEFAULT_RUN_SECS,
};
pub use collector::{
    drain, sweep_idle, transfer, CollectorError, DrainOutcome, EngineConfig, EvictionPolicy,
    SweepOutcome,
};
pub use commands::{execute_collect, CollectResult, CommandError, CommandResult};
pub use context::{EngineContext, ScopedAttachment};
pub use logger::{init_tracing, Logger, MockLogger, NullLogger, TracingLogger, Verbosity};
pub use signal::{ShutdownCheck, ShutdownFlag};
pub use sleeper::{RealSleeper, Sleeper};
