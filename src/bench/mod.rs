//! Benchmark workloads and statistics
//!
//! The timed matmul workload, its aggregation into a run summary, and the
//! quick and memory sanity probes.

mod memcheck;
mod quick;
mod stats;
mod workload;

pub use memcheck::{run_memcheck, MemoryReading};
pub use quick::{quick_matmul, run_quick, QuickResult};
pub use stats::*;
pub use workload::{Workload, DEFAULT_WARMUP};
