//! # wsbench - Workstation Diagnostics
//!
//! wsbench measures how fast a machine multiplies large square matrices on
//! its best compute device, records what hardware it found, and writes the
//! results as a JSON report plus CSV tables. It also ships a quick sanity
//! run, a memory allocation check and a full system audit.
//!
//! ## Features
//!
//! - **Device selection**: `auto` prefers CUDA, then MPS, then CPU
//! - **Timed matmul workload**: warm-ups, synchronized trials, GFLOPS
//! - **Capability snapshot**: OS, CPU, RAM and accelerator facts
//! - **Reports**: `<stamp>_summary.json`, `<stamp>_bench.csv`, `<stamp>_system.csv`
//! - **System audit**: hardware, drivers and software in `system_audit.csv`
//!
//! ## Quick Start
//!
//! ```no_run
//! use wsbench::bench::{summarize, Workload};
//! use wsbench::config::DeviceChoice;
//! use wsbench::device::DeviceRegistry;
//!
//! let registry = DeviceRegistry::with_defaults(Some(42));
//! let backend = registry.resolve(DeviceChoice::Auto).unwrap();
//!
//! let samples = Workload::new(1024, 3).run(backend).unwrap();
//! let summary = summarize(samples).unwrap();
//! summary.print_summary();
//! ```
//!
//! ## Writing Reports
//!
//! ```no_run
//! use wsbench::bench::{summarize, Workload};
//! use wsbench::config::DeviceChoice;
//! use wsbench::device::DeviceRegistry;
//! use wsbench::report::{PersistOptions, Report, ReportWriter, RunStamp};
//! use wsbench::system::Probe;
//!
//! let stamp = RunStamp::now();
//! let probe = Probe::detect();
//! let registry = DeviceRegistry::with_defaults(None);
//! let snapshot = probe.snapshot(&registry);
//!
//! let backend = registry.resolve(DeviceChoice::Auto).unwrap();
//! let summary = summarize(Workload::new(2048, 3).run(backend).unwrap()).unwrap();
//!
//! let report = Report::compose(snapshot, summary, probe.memory_stats());
//! let paths = ReportWriter::new("benchmarks/results", stamp)
//!     .with_options(PersistOptions { pretty: true })
//!     .persist(&report)
//!     .unwrap();
//! println!("{}", paths.summary_json.display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod bench;
pub mod config;
pub mod device;
pub mod error;
pub mod progress;
pub mod report;
pub mod system;

// Re-export commonly used types
pub use bench::{summarize, RunSummary, TimingSample, Workload};
pub use config::{BenchConfig, DeviceChoice};
pub use device::{ComputeBackend, Device, DeviceRegistry};
pub use error::{BenchError, Result};
pub use progress::ProgressReporter;
pub use report::{Report, ReportWriter, RunStamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use wsbench::prelude::*;
    //! ```

    pub use crate::audit::{run_audit, AuditRecord};
    pub use crate::bench::{run_memcheck, run_quick, summarize, RunSummary, TimingSample, Workload};
    pub use crate::config::{BenchConfig, DeviceChoice};
    pub use crate::device::{Availability, ComputeBackend, CpuBackend, Device, DeviceBuffer, DeviceRegistry};
    pub use crate::error::{BenchError, Result};
    pub use crate::progress::ProgressReporter;
    pub use crate::report::{PersistOptions, PersistedPaths, Report, ReportWriter, RunStamp};
    pub use crate::system::{CapabilitySnapshot, MemoryStats, Probe};
}
