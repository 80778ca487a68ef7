//! Timing samples and run statistics

use crate::device::Device;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest elapsed time a trial is credited with (timer resolution)
pub const MIN_ELAPSED_S: f64 = 1e-9;

/// Floating-point operations of an NxN by NxN multiply
pub fn matmul_flops(size: usize) -> f64 {
    let n = size as f64;
    2.0 * n * n * n
}

/// GFLOPS for a square multiply of `size` taking `elapsed_s` seconds
///
/// Returns `None` for zero, negative or non-finite durations.
pub fn throughput_gflops(size: usize, elapsed_s: f64) -> Option<f64> {
    if elapsed_s.is_finite() && elapsed_s > 0.0 {
        Some(matmul_flops(size) / (elapsed_s * 1e9))
    } else {
        None
    }
}

/// One timed trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// 1-based trial index
    pub run_idx: usize,
    /// Device identifier
    pub device: String,
    /// Matrix dimension
    pub size: usize,
    /// Elapsed wall-clock seconds
    pub time_s: f64,
    /// Derived throughput
    pub gflops: f64,
}

impl TimingSample {
    /// Build a sample from a measured duration
    ///
    /// Durations below [`MIN_ELAPSED_S`] are floored so throughput stays finite.
    pub fn new(run_idx: usize, device: Device, size: usize, elapsed: Duration) -> Self {
        Self::from_secs(run_idx, device.name(), size, elapsed.as_secs_f64())
    }

    /// Build a sample from elapsed seconds
    pub fn from_secs(run_idx: usize, device: &str, size: usize, elapsed_s: f64) -> Self {
        let time_s = if elapsed_s.is_finite() {
            elapsed_s.max(MIN_ELAPSED_S)
        } else {
            MIN_ELAPSED_S
        };
        Self {
            run_idx,
            device: device.to_string(),
            size,
            time_s,
            gflops: matmul_flops(size) / (time_s * 1e9),
        }
    }
}

/// Aggregated result of a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Device identifier
    pub device: String,
    /// Matrix dimension
    pub size: usize,
    /// Number of timed trials
    pub runs: usize,
    /// Mean elapsed seconds
    pub time_avg_s: f64,
    /// Minimum elapsed seconds
    pub time_best_s: f64,
    /// Mean throughput
    pub gflops_avg: f64,
    /// Maximum throughput
    pub gflops_best: f64,
    /// Individual trials in run order
    pub per_run: Vec<TimingSample>,
}

/// Reduce timing samples into a [`RunSummary`]
///
/// Best time and best throughput are independent reductions and need not
/// come from the same trial.
pub fn summarize(samples: Vec<TimingSample>) -> Result<RunSummary> {
    let first = samples.first().ok_or(BenchError::EmptySamples)?;
    let (device, size) = (first.device.clone(), first.size);

    if let Some(odd) = samples.iter().find(|s| s.device != device || s.size != size) {
        return Err(BenchError::config(format!(
            "cannot summarize mixed samples ({} x{} with {} x{})",
            device, size, odd.device, odd.size
        )));
    }

    let count = samples.len() as f64;
    let time_avg_s = samples.iter().map(|s| s.time_s).sum::<f64>() / count;
    let time_best_s = samples.iter().map(|s| s.time_s).fold(f64::INFINITY, f64::min);
    let gflops_avg = samples.iter().map(|s| s.gflops).sum::<f64>() / count;
    let gflops_best = samples.iter().map(|s| s.gflops).fold(f64::NEG_INFINITY, f64::max);

    Ok(RunSummary {
        device,
        size,
        runs: samples.len(),
        time_avg_s,
        time_best_s,
        gflops_avg,
        gflops_best,
        per_run: samples,
    })
}

impl RunSummary {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Benchmark Summary ===");
        println!("Device     : {}", self.device);
        println!("Size       : {} x {}", self.size, self.size);
        println!("Runs       : {}", self.runs);
        println!(
            "Time avg   : {:.3} s | best {:.3} s ({})",
            self.time_avg_s,
            self.time_best_s,
            humantime::format_duration(Duration::from_secs_f64(self.time_best_s))
        );
        println!("GFLOPS avg : {:.2} | best {:.2}", self.gflops_avg, self.gflops_best);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn samples(times: &[f64]) -> Vec<TimingSample> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| TimingSample::from_secs(i + 1, "cpu", 64, t))
            .collect()
    }

    #[test]
    fn test_summarize_empty_is_usage_error() {
        assert!(matches!(summarize(Vec::new()), Err(BenchError::EmptySamples)));
    }

    #[test]
    fn test_summarize_known_values() {
        let summary = summarize(samples(&[0.5, 0.25, 1.0])).unwrap();
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.per_run.len(), 3);
        assert!((summary.time_avg_s - 1.75 / 3.0).abs() < 1e-12);
        assert_eq!(summary.time_best_s, 0.25);
        assert_eq!(summary.gflops_best, summary.per_run[1].gflops);
        assert_eq!(summary.device, "cpu");
        assert_eq!(summary.size, 64);
    }

    #[test]
    fn test_summarize_rejects_mixed_devices() {
        let mut mixed = samples(&[0.1, 0.2]);
        mixed[1].device = "cuda".to_string();
        assert!(summarize(mixed).unwrap_err().is_config_error());
    }

    #[test]
    fn test_throughput_formula() {
        assert_eq!(throughput_gflops(1000, 2.0), Some(1.0));
        assert_eq!(throughput_gflops(1000, 0.0), None);
        assert_eq!(throughput_gflops(1000, -1.0), None);
        assert_eq!(throughput_gflops(1000, f64::NAN), None);
    }

    #[test]
    fn test_zero_duration_is_floored() {
        let sample = TimingSample::new(1, Device::Cpu, 8, Duration::ZERO);
        assert_eq!(sample.time_s, MIN_ELAPSED_S);
        assert!(sample.gflops.is_finite());
        assert_eq!(sample.device, "cpu");
    }

    proptest! {
        #[test]
        fn prop_avg_is_mean_and_best_is_min(times in prop::collection::vec(1e-6f64..100.0, 1..50)) {
            let summary = summarize(samples(&times)).unwrap();
            let mean = times.iter().sum::<f64>() / times.len() as f64;
            let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert!((summary.time_avg_s - mean).abs() <= 1e-9 * mean.max(1.0));
            prop_assert_eq!(summary.time_best_s, min);
            prop_assert_eq!(summary.runs, times.len());

            let max_gflops = summary.per_run.iter().map(|s| s.gflops).fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(summary.gflops_best, max_gflops);
        }

        #[test]
        fn prop_throughput_matches_formula(size in 1usize..5000, t in 1e-6f64..1e3) {
            let n = size as f64;
            let expected = 2.0 * n * n * n / (t * 1e9);
            let got = throughput_gflops(size, t).unwrap();
            prop_assert!((got - expected).abs() <= 1e-12 * expected.max(1.0));
        }

        #[test]
        fn prop_throughput_decreases_with_time(size in 1usize..5000, t in 1e-6f64..1e3, factor in 1.01f64..10.0) {
            let fast = throughput_gflops(size, t).unwrap();
            let slow = throughput_gflops(size, t * factor).unwrap();
            prop_assert!(slow < fast);
        }
    }
}
