//! xflow binary.

use std::process::ExitCode;

use clap::Parser;
use xflow_collector::exit::{codes, exit_code};
use xflow_collector::{
    init_tracing, resolve_interface, Cli, CollectArgs, CollectResult, CommandError,
    CommandResult, EngineConfig, Logger, ShutdownFlag, TracingLogger, Verbosity,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let args = cli.collect;

    if let Err(e) = init_tracing(Verbosity::from_count(args.debug)) {
        eprintln!("warning: logging unavailable: {}", e);
    }
    let logger = TracingLogger::new();

    // Ctrl+C / SIGTERM ends collection early; the run still drains and reports.
    let shutdown = ShutdownFlag::new();

    match run(&args, &shutdown, &logger) {
        Ok(result) => {
            println!(
                "Finalized {} flows ({} by sweeps, {} at exit) in {} sweeps, wrote {} rows to {}",
                result.report.flows,
                result.swept,
                result.drained,
                result.sweeps,
                result.report.rows,
                result.output.display()
            );
            ExitCode::from(codes::SUCCESS as u8)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

fn run(
    args: &CollectArgs,
    shutdown: &ShutdownFlag,
    logger: &TracingLogger,
) -> CommandResult<CollectResult> {
    args.validate()?;
    let interface =
        resolve_interface(args.interface.as_deref()).ok_or(CommandError::NoInterface)?;
    let config = args.engine_config(interface)?;
    logger.verbose(&format!("Configuration: {:?}", config));

    run_with_classifier(&config, shutdown, logger)
}

#[cfg(feature = "bpf")]
fn run_with_classifier(
    config: &EngineConfig,
    shutdown: &ShutdownFlag,
    logger: &TracingLogger,
) -> CommandResult<CollectResult> {
    use std::mem::MaybeUninit;

    use xflow_bpf::BpfFlowMaps;
    use xflow_clock::SystemClock;
    use xflow_collector::{execute_collect, RealSleeper};
    use xflow_fs::RealFilesystem;

    let mut object = MaybeUninit::uninit();
    let maps = BpfFlowMaps::load(&mut object)?;

    execute_collect(
        config,
        maps.live(),
        maps.cold(),
        |interface: &str| maps.attach(interface),
        &SystemClock,
        &RealFilesystem,
        &RealSleeper::new(),
        shutdown,
        logger,
    )
}

#[cfg(not(feature = "bpf"))]
fn run_with_classifier(
    _config: &EngineConfig,
    _shutdown: &ShutdownFlag,
    _logger: &TracingLogger,
) -> CommandResult<CollectResult> {
    Err(CommandError::Bpf(xflow_bpf::BpfError::Load(
        "xflow was built without the `bpf` feature".to_string(),
    )))
}
