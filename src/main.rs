//! wsbench CLI - Workstation Diagnostics
//!
//! Matmul throughput benchmark with JSON/CSV reports, plus quick,
//! memcheck, audit and info subcommands.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wsbench::audit::run_audit;
use wsbench::bench::{run_memcheck, run_quick, summarize, Workload};
use wsbench::config::{BenchConfig, CliArgs, Commands, DeviceChoice, DEFAULT_MEMCHECK_SIZE, DEFAULT_SIZE};
use wsbench::device::{Device, DeviceRegistry};
use wsbench::error::{BenchError, Result};
use wsbench::progress::ProgressReporter;
use wsbench::report::{PersistOptions, Report, ReportWriter, RunStamp};
use wsbench::system::Probe;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(&args);

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(args: &CliArgs) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run(args: CliArgs) -> Result<()> {
    match &args.command {
        None | Some(Commands::Run) => cmd_run(&args),
        Some(Commands::Quick) => cmd_quick(&args, args.size_or(DEFAULT_SIZE)),
        Some(Commands::Memcheck) => cmd_memcheck(&args, args.size_or(DEFAULT_MEMCHECK_SIZE)),
        Some(Commands::Audit { output, timeout }) => cmd_audit(output.as_deref(), *timeout),
        Some(Commands::Info { json }) => cmd_info(&args, *json),
    }
}

fn cmd_run(args: &CliArgs) -> Result<()> {
    // Reject bad input before touching any device
    let config = BenchConfig::from_cli(args)?;
    let stamp = RunStamp::now();

    if args.verbose > 0 {
        print_config(&config, &stamp);
    }

    let probe = Probe::detect();
    let registry = DeviceRegistry::with_defaults(config.seed);
    let snapshot = probe.snapshot(&registry);

    let backend = registry
        .resolve(config.device)
        .map_err(|e| e.with_context(format!("device '{}'", config.device.as_str())))?;
    if config.device == DeviceChoice::Auto {
        warn_on_fallback(&probe, backend.device());
    }

    let progress = if args.progress && !args.quiet {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    };
    let workload = Workload::from_config(&config).with_progress(progress);
    let summary = summarize(workload.run(backend)?)?;

    let report = Report::compose(snapshot, summary, probe.memory_stats());
    let paths = ReportWriter::new(&config.outdir, stamp)
        .with_options(PersistOptions { pretty: config.pretty })
        .persist(&report)?;

    if !args.quiet {
        report.bench.print_summary();
        println!("\nReports:");
        for path in paths.all() {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn cmd_quick(args: &CliArgs, size: usize) -> Result<()> {
    require_positive("size", size)?;
    let registry = DeviceRegistry::with_defaults(args.seed);
    let results = run_quick(&registry, size)?;
    if results.is_empty() {
        return Err(BenchError::BackendUnavailable("no usable compute backend registered".into()));
    }
    Ok(())
}

fn cmd_memcheck(args: &CliArgs, size: usize) -> Result<()> {
    require_positive("size", size)?;
    let registry = DeviceRegistry::with_defaults(args.seed);
    let bytes = (size as u64).saturating_mul(size as u64).saturating_mul(4);
    println!(
        "Memory check with a {}x{} f32 buffer ({})",
        size,
        size,
        humansize::format_size(bytes, humansize::BINARY)
    );
    run_memcheck(&registry, size)?;
    Ok(())
}

fn cmd_audit(output: Option<&Path>, timeout: u64) -> Result<()> {
    require_positive("timeout", timeout as usize)?;
    let dir = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    println!("Collecting system audit...");
    let (path, count) = run_audit(&dir, Duration::from_secs(timeout))?;
    let shown = std::fs::canonicalize(&path).unwrap_or(path);
    println!("Wrote {} records to: {}", count, shown.display());
    Ok(())
}

fn cmd_info(args: &CliArgs, json: bool) -> Result<()> {
    let registry = DeviceRegistry::with_defaults(args.seed);
    let snapshot = Probe::detect().snapshot(&registry);
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        snapshot.print_summary();
    }
    Ok(())
}

fn require_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(BenchError::config(format!("{} must be a positive integer", name)));
    }
    Ok(())
}

/// Hardware was found but no backend for it is compiled in
fn warn_on_fallback(probe: &Probe, chosen: Device) {
    if chosen != Device::Cpu {
        return;
    }
    if probe.cuda.availability.is_available() || probe.mps.is_available() {
        tracing::warn!(
            "Accelerator hardware detected but no accelerator backend is built in; benchmarking on cpu"
        );
    }
}

fn print_config(config: &BenchConfig, stamp: &RunStamp) {
    println!("=== Configuration ===");
    println!("Run stamp:  {}", stamp);
    println!("Device:     {}", config.device.as_str());
    println!("Size:       {}", config.size);
    println!("Runs:       {} (+{} warm-up)", config.runs, config.warmup);
    println!("Output dir: {}", config.outdir.display());
    println!("Pretty:     {}", config.pretty);
    match config.seed {
        Some(seed) => println!("Seed:       {}", seed),
        None => println!("Seed:       random"),
    }
    println!();
}
