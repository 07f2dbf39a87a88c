//! CLI argument parsing for xflow.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use thiserror::Error;
use xflow_reporter::{DedupMode, ReportOptions, UnrecognizedPolicy};

use crate::collector::EngineConfig;

/// Default run time in seconds.
pub const DEFAULT_RUN_SECS: u64 = 5;

/// Default idle threshold (and sweep interval) in seconds.
pub const DEFAULT_AGGREGATE_SECS: u64 = 60;

/// Default report path.
pub const DEFAULT_OUTPUT: &str = "flows.csv";

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("time must be at least 1 second, got {0}")]
    InvalidTime(u64),

    #[error("sweep interval must be at least 1 second, got {0}")]
    InvalidSweepInterval(u64),

    #[error("output path must not be empty")]
    EmptyOutput,

    #[error("interface name must not be empty")]
    EmptyInterface,
}

/// Report deduplication, as spelled on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupArg {
    /// One row per flow.
    #[default]
    FlowKey,
    /// Collapse rows with identical text.
    RenderedText,
}

impl From<DedupArg> for DedupMode {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::FlowKey => DedupMode::FlowKey,
            DedupArg::RenderedText => DedupMode::RenderedText,
        }
    }
}

/// xflow - XDP flow collector. Aggregates per-CPU flow counters, finalizes
/// idle flows and writes a time-sorted CSV report on exit.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "xflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub collect: CollectArgs,
}

/// Collection run arguments.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct CollectArgs {
    /// Interface to attach the classifier to.
    /// If not specified, uses the interface with the default route.
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Time to run in seconds.
    #[arg(short, long, default_value_t = DEFAULT_RUN_SECS)]
    pub time: u64,

    /// Idle time in seconds after which a flow is finalized.
    #[arg(short, long, default_value_t = DEFAULT_AGGREGATE_SECS)]
    pub aggregate: u64,

    /// Seconds between sweeps. Defaults to the aggregate time.
    #[arg(long)]
    pub sweep_interval: Option<u64>,

    /// Report file (CSV).
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Increase log verbosity (-d debug, -dd trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub debug: u8,

    /// How duplicate report rows are collapsed.
    #[arg(long, value_enum, default_value_t = DedupArg::FlowKey)]
    pub dedup: DedupArg,

    /// Leave flows with undecodable addresses out of the report.
    #[arg(long)]
    pub skip_undecoded: bool,

    /// Append one JSON status line per sweep to this file.
    #[arg(long)]
    pub status_file: Option<PathBuf>,
}

impl CollectArgs {
    /// Sweep interval in effect.
    pub fn effective_sweep_interval(&self) -> u64 {
        self.sweep_interval.unwrap_or(self.aggregate)
    }

    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.time == 0 {
            return Err(CliError::InvalidTime(self.time));
        }
        let sweep_interval = self.effective_sweep_interval();
        if sweep_interval == 0 {
            return Err(CliError::InvalidSweepInterval(sweep_interval));
        }
        if self.output.as_os_str().is_empty() {
            return Err(CliError::EmptyOutput);
        }
        if matches!(self.interface.as_deref(), Some("")) {
            return Err(CliError::EmptyInterface);
        }
        Ok(())
    }

    /// Validate and build the engine configuration for `interface`.
    pub fn engine_config(&self, interface: String) -> Result<EngineConfig, CliError> {
        self.validate()?;
        Ok(EngineConfig {
            interface,
            run_time_sec: self.time,
            idle_threshold_sec: self.aggregate,
            sweep_interval_sec: self.effective_sweep_interval(),
            output: self.output.clone(),
            status_file: self.status_file.clone(),
            report: ReportOptions {
                dedup: self.dedup.into(),
                unrecognized: if self.skip_undecoded {
                    UnrecognizedPolicy::Skip
                } else {
                    UnrecognizedPolicy::Render
                },
            },
        })
    }
}

/// Parse CLI arguments from an iterator of strings.
/// Useful for testing.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}

/// Get the default network interface (the one with the default route).
/// Returns None if no default interface can be determined.
pub fn default_interface() -> Option<String> {
    let route_content = std::fs::read_to_string("/proc/net/route").ok()?;
    parse_route_table(&route_content)
}

/// Parse /proc/net/route content to find the default interface.
pub fn parse_route_table(content: &str) -> Option<String> {
    content
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        // Default route has destination 00000000
        .find(|fields| fields.len() >= 2 && fields[1] == "00000000")
        .map(|fields| fields[0].to_string())
}

/// Resolve the interface to use: explicit argument or auto-detected default.
pub fn resolve_interface(explicit: Option<&str>) -> Option<String> {
    explicit.map(String::from).or_else(default_interface)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CollectArgs {
        let mut full = vec!["xflow"];
        full.extend_from_slice(argv);
        parse_from(full).expect("parse").collect
    }

    // ===========================================
    // Argument parsing
    // ===========================================

    #[test]
    fn test_defaults() {
        let a = args(&[]);
        assert_eq!(a.interface, None);
        assert_eq!(a.time, DEFAULT_RUN_SECS);
        assert_eq!(a.aggregate, DEFAULT_AGGREGATE_SECS);
        assert_eq!(a.sweep_interval, None);
        assert_eq!(a.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(a.debug, 0);
        assert_eq!(a.dedup, DedupArg::FlowKey);
        assert!(!a.skip_undecoded);
        assert_eq!(a.status_file, None);
    }

    #[test]
    fn test_short_flags() {
        let a = args(&["-i", "eth1", "-t", "30", "-a", "10", "-o", "/tmp/f.csv"]);
        assert_eq!(a.interface.as_deref(), Some("eth1"));
        assert_eq!(a.time, 30);
        assert_eq!(a.aggregate, 10);
        assert_eq!(a.output, PathBuf::from("/tmp/f.csv"));
    }

    #[test]
    fn test_long_flags() {
        let a = args(&[
            "--interface",
            "enp0s3",
            "--time",
            "120",
            "--aggregate",
            "15",
            "--sweep-interval",
            "5",
            "--output",
            "out.csv",
            "--status-file",
            "status.jsonl",
            "--skip-undecoded",
        ]);
        assert_eq!(a.interface.as_deref(), Some("enp0s3"));
        assert_eq!(a.time, 120);
        assert_eq!(a.aggregate, 15);
        assert_eq!(a.sweep_interval, Some(5));
        assert_eq!(a.status_file, Some(PathBuf::from("status.jsonl")));
        assert!(a.skip_undecoded);
    }

    #[test]
    fn test_debug_flag_counts() {
        assert_eq!(args(&["-d"]).debug, 1);
        assert_eq!(args(&["-dd"]).debug, 2);
        assert_eq!(args(&["--debug", "--debug", "--debug"]).debug, 3);
    }

    #[test]
    fn test_dedup_values() {
        assert_eq!(args(&["--dedup", "rendered-text"]).dedup, DedupArg::RenderedText);
        assert_eq!(args(&["--dedup", "flow-key"]).dedup, DedupArg::FlowKey);
        assert!(parse_from(["xflow", "--dedup", "bogus"]).is_err());
    }

    #[test]
    fn test_negative_time_rejected() {
        assert!(parse_from(["xflow", "-t", "-1"]).is_err());
    }

    #[test]
    fn test_non_numeric_aggregate_rejected() {
        assert!(parse_from(["xflow", "-a", "abc"]).is_err());
    }

    #[test]
    fn test_unknown_flag() {
        assert!(parse_from(["xflow", "--unknown"]).is_err());
    }

    #[test]
    fn test_help_flag() {
        let err = parse_from(["xflow", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = parse_from(["xflow", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    // ===========================================
    // Validation
    // ===========================================

    #[test]
    fn test_sweep_interval_defaults_to_aggregate() {
        assert_eq!(args(&["-a", "42"]).effective_sweep_interval(), 42);
        assert_eq!(
            args(&["-a", "42", "--sweep-interval", "7"]).effective_sweep_interval(),
            7
        );
    }

    #[test]
    fn test_zero_time_invalid() {
        assert_eq!(args(&["-t", "0"]).validate(), Err(CliError::InvalidTime(0)));
    }

    #[test]
    fn test_zero_aggregate_without_sweep_interval_invalid() {
        assert_eq!(
            args(&["-a", "0"]).validate(),
            Err(CliError::InvalidSweepInterval(0))
        );
    }

    #[test]
    fn test_zero_aggregate_with_sweep_interval_valid() {
        assert_eq!(args(&["-a", "0", "--sweep-interval", "1"]).validate(), Ok(()));
    }

    #[test]
    fn test_empty_output_invalid() {
        assert_eq!(args(&["-o", ""]).validate(), Err(CliError::EmptyOutput));
    }

    #[test]
    fn test_empty_interface_invalid() {
        assert_eq!(args(&["-i", ""]).validate(), Err(CliError::EmptyInterface));
    }

    #[test]
    fn test_engine_config_conversion() {
        let config = args(&[
            "-t",
            "9",
            "-a",
            "3",
            "--dedup",
            "rendered-text",
            "--skip-undecoded",
        ])
        .engine_config("eth0".to_string())
        .expect("config");

        assert_eq!(config.interface, "eth0");
        assert_eq!(config.run_time_sec, 9);
        assert_eq!(config.idle_threshold_sec, 3);
        assert_eq!(config.sweep_interval_sec, 3);
        assert_eq!(config.report.dedup, DedupMode::RenderedText);
        assert_eq!(config.report.unrecognized, UnrecognizedPolicy::Skip);
    }

    #[test]
    fn test_engine_config_rejects_invalid() {
        let result = args(&["-t", "0"]).engine_config("eth0".to_string());
        assert_eq!(result.unwrap_err(), CliError::InvalidTime(0));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CliError::InvalidTime(0).to_string(),
            "time must be at least 1 second, got 0"
        );
        assert_eq!(
            CliError::InvalidSweepInterval(0).to_string(),
            "sweep interval must be at least 1 second, got 0"
        );
    }

    // ===========================================
    // Interface auto-detection
    // ===========================================

    #[test]
    fn test_resolve_interface_explicit() {
        assert_eq!(resolve_interface(Some("eth0")), Some("eth0".to_string()));
    }

    #[test]
    fn test_default_interface_returns_option() {
        // Depends on the host; only a non-empty name is acceptable.
        if let Some(iface) = default_interface() {
            assert!(!iface.is_empty());
        }
    }

    #[test]
    fn test_parse_route_table_with_default_route() {
        let content = "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\tMTU\tWindow\tIRTT
eth0\t00000000\t0102A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0002A8C0\t00000000\t0001\t0\t0\t100\tFFFFFFFF\t0\t0\t0";
        assert_eq!(parse_route_table(content), Some("eth0".to_string()));
    }

    #[test]
    fn test_parse_route_table_no_default_route() {
        let content = "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\tMTU\tWindow\tIRTT
eth0\t0002A8C0\t00000000\t0001\t0\t0\t100\tFFFFFFFF\t0\t0\t0";
        assert_eq!(parse_route_table(content), None);
    }

    #[test]
    fn test_parse_route_table_header_only() {
        assert_eq!(parse_route_table("Iface\tDestination\tGateway"), None);
        assert_eq!(parse_route_table(""), None);
    }

    #[test]
    fn test_parse_route_table_malformed_line_short() {
        let content = "Iface\tDestination\tGateway
eth0";
        assert_eq!(parse_route_table(content), None);
    }

    #[test]
    fn test_parse_route_table_default_route_not_first() {
        let content = "Iface\tDestination\tGateway\tFlags
eth0\t0002A8C0\t00000000\t0001
wlan0\t00000000\t0102A8C0\t0003";
        assert_eq!(parse_route_table(content), Some("wlan0".to_string()));
    }
}
