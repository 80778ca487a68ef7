//! Matmul workload
//!
//! Allocates two random NxN buffers on the target device once, runs the
//! warm-up multiplies, then times each trial up to a synchronization
//! barrier so asynchronous devices are measured to completion.

use super::stats::TimingSample;
use crate::config::BenchConfig;
use crate::device::ComputeBackend;
use crate::error::{BenchError, Result};
use crate::progress::ProgressReporter;
use std::hint::black_box;
use std::time::Instant;

/// Untimed multiplies before measurement starts
pub const DEFAULT_WARMUP: usize = 2;

/// Square matrix multiply benchmark
pub struct Workload {
    size: usize,
    runs: usize,
    warmup: usize,
    progress: Option<ProgressReporter>,
}

impl Workload {
    /// Create a workload of `runs` timed NxN multiplies
    pub fn new(size: usize, runs: usize) -> Self {
        Self {
            size,
            runs,
            warmup: DEFAULT_WARMUP,
            progress: None,
        }
    }

    /// Create a workload from a validated configuration
    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(config.size, config.runs).with_warmup(config.warmup)
    }

    /// Override the warm-up count
    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Attach a progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the workload on `backend`, returning one sample per timed trial
    ///
    /// Allocation failure aborts the whole run; no partial samples are returned.
    pub fn run(&self, backend: &dyn ComputeBackend) -> Result<Vec<TimingSample>> {
        if self.size == 0 {
            return Err(BenchError::config("matrix size must be positive"));
        }
        if self.runs == 0 {
            return Err(BenchError::config("repeat count must be at least 1"));
        }

        let device = backend.device();
        tracing::info!(
            "Running {}x{} matmul on {} ({} warm-up, {} timed)",
            self.size,
            self.size,
            device,
            self.warmup,
            self.runs
        );

        let result = self.run_inner(backend);
        if let Some(progress) = &self.progress {
            match &result {
                Ok(_) => progress.finish_success("benchmark complete"),
                Err(e) => progress.finish_error(&e.to_string()),
            }
        }
        result
    }

    fn run_inner(&self, backend: &dyn ComputeBackend) -> Result<Vec<TimingSample>> {
        let device = backend.device();
        let a = backend.random_matrix(self.size, self.size)?;
        let b = backend.random_matrix(self.size, self.size)?;

        if let Some(progress) = &self.progress {
            progress.set_total_trials(self.runs as u64);
        }

        for _ in 0..self.warmup {
            black_box(backend.matmul(&a, &b)?);
            if device.is_async() {
                backend.synchronize()?;
            }
            if let Some(progress) = &self.progress {
                progress.warmup_done();
            }
        }

        let mut samples = Vec::with_capacity(self.runs);
        for run_idx in 1..=self.runs {
            let start = Instant::now();
            let product = backend.matmul(&a, &b)?;
            backend.synchronize()?;
            let elapsed = start.elapsed();
            black_box(product);

            let sample = TimingSample::new(run_idx, device, self.size, elapsed);
            tracing::debug!(
                "trial {}/{}: {:.6} s, {:.2} GFLOPS",
                run_idx,
                self.runs,
                sample.time_s,
                sample.gflops
            );
            if let Some(progress) = &self.progress {
                progress.trial_done(sample.gflops);
            }
            samples.push(sample);
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeBackend;
    use crate::device::{Availability, CpuBackend, Device};

    #[test]
    fn test_cpu_workload_returns_one_sample_per_run() {
        let backend = CpuBackend::new(Some(7));
        let samples = Workload::new(128, 3).run(&backend).unwrap();

        assert_eq!(samples.len(), 3);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.run_idx, i + 1);
            assert_eq!(s.device, "cpu");
            assert_eq!(s.size, 128);
            assert!(s.time_s > 0.0);
            assert!(s.gflops.is_finite() && s.gflops > 0.0);
        }
    }

    #[test]
    fn test_rejects_invalid_parameters_before_allocation() {
        let backend = FakeBackend::failing_alloc(Device::Cpu);
        assert!(Workload::new(0, 3).run(&backend).unwrap_err().is_config_error());
        assert!(Workload::new(16, 0).run(&backend).unwrap_err().is_config_error());
    }

    #[test]
    fn test_async_device_warmup_and_barriers() {
        let backend = FakeBackend::new(Device::Cuda, Availability::Available);
        let samples = Workload::new(8, 4).run(&backend).unwrap();

        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.device == "cuda"));
        // 2 warm-up + 4 timed multiplies, each followed by a barrier
        assert_eq!(backend.matmul_count(), 6);
        assert_eq!(backend.sync_count(), 6);
    }

    #[test]
    fn test_sync_device_skips_warmup_barriers() {
        let backend = FakeBackend::new(Device::Cpu, Availability::Available);
        Workload::new(8, 3).with_warmup(2).run(&backend).unwrap();
        assert_eq!(backend.matmul_count(), 5);
        assert_eq!(backend.sync_count(), 3);
    }

    #[test]
    fn test_allocation_failure_aborts_run() {
        let backend = FakeBackend::failing_alloc(Device::Cuda);
        let err = Workload::new(8, 3).run(&backend).unwrap_err();
        assert!(err.is_resource_error());
        assert_eq!(backend.matmul_count(), 0);
    }

    #[test]
    fn test_progress_is_driven() {
        let backend = FakeBackend::new(Device::Cpu, Availability::Available);
        let workload = Workload::new(4, 2).with_progress(ProgressReporter::disabled());
        workload.run(&backend).unwrap();
        let summary = workload.progress.as_ref().unwrap().summary();
        assert_eq!(summary.trials_done, 2);
        assert_eq!(summary.warmups_done, 2);
    }
}
