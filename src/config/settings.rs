//! Configuration settings for wsbench
//!
//! Defines the CLI arguments, subcommands and the validated runtime
//! configuration for a benchmark run.

use crate::error::{BenchError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default square matrix dimension
pub const DEFAULT_SIZE: usize = 4096;
/// Default number of timed trials
pub const DEFAULT_RUNS: usize = 3;
/// Default buffer dimension for `memcheck`
pub const DEFAULT_MEMCHECK_SIZE: usize = 10_000;
/// Default report directory
pub const DEFAULT_OUTDIR: &str = "benchmarks/results";

/// wsbench - workstation benchmark and audit toolkit
#[derive(Parser, Debug, Clone)]
#[command(name = "wsbench")]
#[command(author = "wsbench Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Matmul throughput probe, memory check and system audit")]
#[command(long_about = r#"
wsbench collects a system snapshot, runs a square matrix multiply
benchmark on the CPU or an accelerator and writes JSON/CSV reports.

Outputs (per run, under --outdir):
  <timestamp>_summary.json   all data (system + memory + bench)
  <timestamp>_bench.csv      per-run timing/gflops
  <timestamp>_system.csv     key/value snapshot

Examples:
  wsbench                                  # auto device, 4096x4096, 3 runs
  wsbench --device cpu --size 1024 --runs 5 --pretty
  wsbench quick                            # one multiply per device
  wsbench memcheck --size 2048             # allocation sanity check
  wsbench audit --output /tmp              # system_audit.csv
"#)]
pub struct CliArgs {
    /// Compute device
    #[arg(short = 'd', long, value_enum, default_value = "auto", env = "WSBENCH_DEVICE", global = true)]
    pub device: DeviceChoice,

    /// Square matrix dimension (N for an NxN multiply) [default: 4096, memcheck: 10000]
    #[arg(short = 's', long, env = "WSBENCH_SIZE", value_name = "N", global = true)]
    pub size: Option<usize>,

    /// Number of timed trials
    #[arg(short = 'r', long, default_value_t = DEFAULT_RUNS, env = "WSBENCH_RUNS", value_name = "NUM", global = true)]
    pub runs: usize,

    /// Output directory for reports
    #[arg(short = 'o', long, default_value = DEFAULT_OUTDIR, env = "WSBENCH_OUTDIR", value_name = "PATH", global = true)]
    pub outdir: PathBuf,

    /// Pretty-print the JSON summary
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Seed for the matrix RNG (random if omitted)
    #[arg(long, value_name = "SEED", global = true)]
    pub seed: Option<u64>,

    /// Show a progress bar over timed trials
    #[arg(short = 'p', long, global = true)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full benchmark and write reports (default)
    #[command(name = "run")]
    Run,

    /// One timed multiply on the CPU and on the best accelerator
    #[command(name = "quick")]
    Quick,

    /// Allocate a large buffer and report host memory usage around it
    #[command(name = "memcheck")]
    Memcheck,

    /// Collect a full system audit into system_audit.csv
    #[command(name = "audit")]
    Audit {
        /// Directory for system_audit.csv (defaults to current directory)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Per-command timeout in seconds
        #[arg(long, default_value = "30", value_name = "SECS")]
        timeout: u64,
    },

    /// Print the capability snapshot
    #[command(name = "info")]
    Info {
        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Device requested on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    /// Best available: cuda, then mps, then cpu
    #[default]
    Auto,
    /// Host CPU
    Cpu,
    /// NVIDIA CUDA GPU
    Cuda,
    /// Apple Metal Performance Shaders
    Mps,
}

impl CliArgs {
    /// `--size` if given, otherwise the subcommand's default
    pub fn size_or(&self, default: usize) -> usize {
        self.size.unwrap_or(default)
    }
}

impl DeviceChoice {
    /// Lowercase name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Mps => "mps",
        }
    }

    /// Parse a device name, case-insensitively
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "mps" => Ok(Self::Mps),
            other => Err(BenchError::UnsupportedDevice(other.to_string())),
        }
    }
}

/// Validated runtime configuration for a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Requested device
    pub device: DeviceChoice,
    /// Matrix dimension
    pub size: usize,
    /// Timed trial count
    pub runs: usize,
    /// Untimed warm-up multiplies
    pub warmup: usize,
    /// Report directory
    pub outdir: PathBuf,
    /// Pretty JSON output
    pub pretty: bool,
    /// RNG seed
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            device: DeviceChoice::Auto,
            size: DEFAULT_SIZE,
            runs: DEFAULT_RUNS,
            warmup: 2,
            outdir: PathBuf::from(DEFAULT_OUTDIR),
            pretty: false,
            seed: None,
        }
    }
}

impl BenchConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let config = Self {
            device: args.device,
            size: args.size_or(DEFAULT_SIZE),
            runs: args.runs,
            outdir: args.outdir.clone(),
            pretty: args.pretty,
            seed: args.seed,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the workload meaningless
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(BenchError::config("size must be a positive integer"));
        }
        if self.runs == 0 {
            return Err(BenchError::config("runs must be a positive integer"));
        }
        if self.outdir.as_os_str().is_empty() {
            return Err(BenchError::config("output directory must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_cli() {
        let args = CliArgs::parse_from(["wsbench"]);
        let config = BenchConfig::from_cli(&args).unwrap();
        assert_eq!(config.device, DeviceChoice::Auto);
        assert_eq!(config.size, DEFAULT_SIZE);
        assert_eq!(config.runs, DEFAULT_RUNS);
        assert_eq!(config.warmup, 2);
        assert_eq!(config.outdir, PathBuf::from(DEFAULT_OUTDIR));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs::parse_from([
            "wsbench", "--device", "cpu", "--size", "128", "--runs", "5", "--outdir", "/tmp/out",
            "--pretty", "--seed", "7",
        ]);
        let config = BenchConfig::from_cli(&args).unwrap();
        assert_eq!(config.device, DeviceChoice::Cpu);
        assert_eq!(config.size, 128);
        assert_eq!(config.runs, 5);
        assert!(config.pretty);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_rejects_zero_size_and_runs() {
        let args = CliArgs::parse_from(["wsbench", "--size", "0"]);
        assert!(BenchConfig::from_cli(&args).unwrap_err().is_config_error());

        let args = CliArgs::parse_from(["wsbench", "--runs", "0"]);
        assert!(BenchConfig::from_cli(&args).unwrap_err().is_config_error());
    }

    #[test]
    fn test_unknown_device_rejected() {
        assert!(CliArgs::try_parse_from(["wsbench", "--device", "tpu"]).is_err());
        assert!(matches!(
            DeviceChoice::parse("tpu"),
            Err(BenchError::UnsupportedDevice(_))
        ));
        assert_eq!(DeviceChoice::parse("CUDA").unwrap(), DeviceChoice::Cuda);
    }

    #[test]
    fn test_subcommands() {
        let args = CliArgs::parse_from(["wsbench", "audit", "--timeout", "5"]);
        match args.command {
            Some(Commands::Audit { output, timeout }) => {
                assert!(output.is_none());
                assert_eq!(timeout, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = CliArgs::parse_from(["wsbench", "memcheck"]);
        assert!(matches!(args.command, Some(Commands::Memcheck)));
        assert_eq!(args.size_or(DEFAULT_MEMCHECK_SIZE), DEFAULT_MEMCHECK_SIZE);
    }

    #[test]
    fn test_run_options_accepted_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "wsbench", "run", "--size", "128", "--runs", "2", "--outdir", "/tmp/out", "--pretty",
            "--seed", "9", "--progress",
        ])
        .unwrap();
        assert!(matches!(args.command, Some(Commands::Run)));
        let config = BenchConfig::from_cli(&args).unwrap();
        assert_eq!(config.size, 128);
        assert_eq!(config.runs, 2);
        assert_eq!(config.outdir, PathBuf::from("/tmp/out"));
        assert!(config.pretty);
        assert_eq!(config.seed, Some(9));
        assert!(args.progress);
    }

    #[test]
    fn test_size_shared_by_quick_and_memcheck() {
        let args = CliArgs::try_parse_from(["wsbench", "memcheck", "--size", "2048"]).unwrap();
        assert_eq!(args.size_or(DEFAULT_MEMCHECK_SIZE), 2048);

        let args = CliArgs::try_parse_from(["wsbench", "quick"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Quick)));
        assert_eq!(args.size_or(DEFAULT_SIZE), DEFAULT_SIZE);
    }
}
