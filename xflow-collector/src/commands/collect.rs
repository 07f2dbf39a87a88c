//! Collect command orchestration.
//!
//! Startup reconciles the time base and attaches the classifier; either
//! failure ends the run before any flow is touched. The loop then sweeps idle
//! flows until the run time is up or shutdown is requested. Once the loop ends
//! the classifier is detached first, so the drain sees a table nothing writes
//! to; a failed detach is logged and the report is still produced before the
//! teardown error is returned.

use std::path::PathBuf;

use chrono::{SecondsFormat, TimeZone, Utc};
use xflow_bpf::{Attachment, BpfError, ColdCache, LiveTable};
use xflow_clock::{reconcile_time_base, Clock};
use xflow_fs::Filesystem;
use xflow_reporter::{compile_report, ReportStats, UnrecognizedPolicy};

use crate::collector::EngineConfig;
use crate::context::EngineContext;
use crate::io::{OutputWriter, StatusLine, StatusWriter};
use crate::logger::Logger;
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

use super::{CommandError, CommandResult};

/// Result of a collection run.
#[derive(Debug)]
pub struct CollectResult {
    /// Sweeps completed.
    pub sweeps: u64,
    /// Flows finalized by sweeps.
    pub swept: usize,
    /// Flows finalized by the drain.
    pub drained: usize,
    /// True if the run ended on a shutdown request.
    pub interrupted: bool,
    pub report: ReportStats,
    /// Where the report was written.
    pub output: PathBuf,
}

#[derive(Debug, Default)]
struct LoopStats {
    sweeps: u64,
    swept: usize,
    interrupted: bool,
}

/// Format Unix seconds as an RFC 3339 UTC timestamp.
fn format_wall(ts: f64) -> String {
    Utc.timestamp_opt(ts as i64, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| format!("{:.0}", ts))
}

/// Execute a collection run.
///
/// `attach` is called with the configured interface once the time base is
/// known. The tables are the classifier's maps in production and in-memory
/// mocks in tests.
#[allow(clippy::too_many_arguments)]
pub fn execute_collect<L, C, A, AF, K, F, S, H, G>(
    config: &EngineConfig,
    live: L,
    cold: C,
    attach: AF,
    clock: &K,
    fs: &F,
    sleeper: &S,
    shutdown: &H,
    logger: &G,
) -> CommandResult<CollectResult>
where
    L: LiveTable,
    C: ColdCache,
    A: Attachment,
    AF: FnOnce(&str) -> Result<A, BpfError>,
    K: Clock,
    F: Filesystem,
    S: Sleeper,
    H: ShutdownCheck,
    G: Logger,
{
    let offset = reconcile_time_base(clock)?;
    logger.verbose(&format!(
        "Monotonic clock offset: {:.6}s",
        offset.seconds()
    ));

    let attachment = attach(&config.interface)?;
    logger.info(&format!("Attached classifier to {}", config.interface));

    let mut ctx = EngineContext::new(live, cold, offset, attachment, logger);
    let status_writer = config
        .status_file
        .clone()
        .map(|path| StatusWriter::new(fs, path));

    let stats = match run_collection_loop(&ctx, config, clock, status_writer.as_ref(), sleeper, shutdown, logger) {
        Ok(stats) => stats,
        Err(e) => return Err(abort(ctx, e, logger)),
    };

    let teardown = ctx.detach();
    if let Err(e) = &teardown {
        logger.warn(&format!("Teardown failed, draining anyway: {}", e));
    }

    logger.info("Caching ongoing flows");
    let drained = ctx.drain()?;
    logger.verbose(&format!(
        "Drained {} flows ({} found after the first pass)",
        drained.drained, drained.leftovers
    ));
    if drained.remaining > 0 {
        logger.warn(&format!(
            "{} flows were still being updated after the drain",
            drained.remaining
        ));
    }

    let entries = ctx.finalized()?;
    let report = compile_report(&entries, ctx.offset(), &config.report);
    log_report_stats(&report.stats, config, logger);

    let output = OutputWriter::new(fs, &config.output).write_report(&report)?;
    logger.info(&format!(
        "Wrote {} flows to {}",
        report.stats.rows,
        output.display()
    ));

    teardown.map_err(CommandError::Teardown)?;

    Ok(CollectResult {
        sweeps: stats.sweeps,
        swept: stats.swept,
        drained: drained.drained,
        interrupted: stats.interrupted,
        report: report.stats,
        output,
    })
}

/// Detach after a failure, keeping the original error.
fn abort<L, C, A, G>(ctx: EngineContext<'_, L, C, A>, error: CommandError, logger: &G) -> CommandError
where
    L: LiveTable,
    C: ColdCache,
    A: Attachment,
    G: Logger,
{
    if let Err(e) = ctx.finish() {
        logger.warn(&format!("Teardown after failure also failed: {}", e));
    }
    error
}

fn log_report_stats<G: Logger>(stats: &ReportStats, config: &EngineConfig, logger: &G) {
    if stats.undecoded > 0 {
        let action = match config.report.unrecognized {
            UnrecognizedPolicy::Render => "addresses left empty",
            UnrecognizedPolicy::Skip => "rows skipped",
        };
        logger.warn(&format!(
            "{} flows have an unrecognized ethertype ({})",
            stats.undecoded, action
        ));
    }
    logger.verbose(&format!(
        "Report: flows={} rows={} phantoms={} duplicates={}",
        stats.flows, stats.rows, stats.phantoms, stats.duplicates
    ));
}

/// Tick once per second until the deadline or a shutdown request, sweeping
/// every `sweep_interval_sec`.
#[allow(clippy::too_many_arguments)]
fn run_collection_loop<L, C, A, K, F, S, H, G>(
    ctx: &EngineContext<'_, L, C, A>,
    config: &EngineConfig,
    clock: &K,
    status_writer: Option<&StatusWriter<&F>>,
    sleeper: &S,
    shutdown: &H,
    logger: &G,
) -> CommandResult<LoopStats>
where
    L: LiveTable,
    C: ColdCache,
    A: Attachment,
    K: Clock,
    F: Filesystem,
    S: Sleeper,
    H: ShutdownCheck,
    G: Logger,
{
    let mut stats = LoopStats::default();

    let start = clock.wall_time_sec()?;
    let deadline = start + config.run_time_sec as f64;
    let interval = config.sweep_interval_sec as f64;
    let mut next_sweep = start + interval;

    logger.info(&format!(
        "Collecting on {} until {} (idle threshold {}s, sweep every {}s)",
        config.interface,
        format_wall(deadline),
        config.idle_threshold_sec,
        config.sweep_interval_sec
    ));

    loop {
        if shutdown.should_stop() {
            logger.info("Caught shutdown signal; finishing");
            stats.interrupted = true;
            break;
        }

        let now = clock.wall_time_sec()?;
        if now >= deadline {
            break;
        }

        if now >= next_sweep {
            let outcome = ctx.sweep(config.idle_threshold_sec, now)?;
            stats.sweeps += 1;
            stats.swept += outcome.evicted;
            next_sweep = now + interval;

            logger.verbose(&format!(
                "sweep={} scanned={} evicted={} phantoms={} remaining={}",
                stats.sweeps, outcome.scanned, outcome.evicted, outcome.phantoms, outcome.remaining
            ));

            if let Some(writer) = status_writer {
                match ctx.cold().len() {
                    Ok(cold_total) => {
                        let line = StatusLine::from_sweep(now as u64, stats.sweeps, &outcome, cold_total);
                        if let Err(e) = writer.append(&line) {
                            logger.warn(&format!("Status update failed: {}", e));
                        }
                    }
                    Err(e) => logger.warn(&format!("Status update skipped: {}", e)),
                }
            }
        }

        logger.debug(&format!("Collecting for {:.0}s more", deadline - now));
        sleeper.sleep_sec(1);
    }

    Ok(stats)
}
