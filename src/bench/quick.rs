//! Quick matmul sanity probe
//!
//! One timed multiply on the CPU and, when one is usable, on the best
//! accelerator. Prints elapsed time and the mean of the product so a
//! broken kernel (NaNs, zeros) is visible at a glance.

use crate::device::{ComputeBackend, Device, DeviceRegistry};
use crate::error::Result;
use std::time::{Duration, Instant};

/// Result of one quick multiply
#[derive(Debug, Clone)]
pub struct QuickResult {
    /// Device the multiply ran on
    pub device: Device,
    /// Matrix dimension
    pub size: usize,
    /// Elapsed time up to the barrier
    pub elapsed: Duration,
    /// Mean of the product matrix
    pub mean: f64,
}

/// Time a single NxN multiply on `backend`
pub fn quick_matmul(backend: &dyn ComputeBackend, size: usize) -> Result<QuickResult> {
    let a = backend.random_matrix(size, size)?;
    let b = backend.random_matrix(size, size)?;
    backend.synchronize()?;

    let start = Instant::now();
    let c = backend.matmul(&a, &b)?;
    backend.synchronize()?;
    let elapsed = start.elapsed();

    Ok(QuickResult {
        device: backend.device(),
        size,
        elapsed,
        mean: c.mean(),
    })
}

/// Run on the CPU, then on the first available accelerator
pub fn run_quick(registry: &DeviceRegistry, size: usize) -> Result<Vec<QuickResult>> {
    let mut targets: Vec<&dyn ComputeBackend> = Vec::new();
    if let Some(cpu) = registry.get(Device::Cpu) {
        targets.push(cpu);
    }
    if let Some(accel) = [Device::Cuda, Device::Mps]
        .iter()
        .filter_map(|&d| registry.get(d))
        .find(|b| b.availability().is_available())
    {
        targets.push(accel);
    }

    let mut results = Vec::with_capacity(targets.len());
    for backend in targets {
        println!("Running matmul benchmark on {} (size={})...", backend.device(), size);
        let result = quick_matmul(backend, size)?;
        println!(
            "Elapsed: {:.3}s | c.mean={:.4}",
            result.elapsed.as_secs_f64(),
            result.mean
        );
        results.push(result);
    }
    Ok(results)
}
