//! Memory allocation sanity check
//!
//! Allocates a large random matrix and reports host RAM usage before the
//! allocation, after it, and after it is released.

use crate::device::{ComputeBackend, Device, DeviceRegistry};
use crate::error::Result;
use sysinfo::System;

/// Host memory usage at one step of the check
#[derive(Debug, Clone)]
pub struct MemoryReading {
    /// Step label
    pub label: String,
    /// Used RAM in bytes
    pub used: u64,
    /// Total RAM in bytes
    pub total: u64,
}

impl MemoryReading {
    fn take(sys: &mut System, label: &str) -> Self {
        sys.refresh_memory();
        let reading = Self {
            label: label.to_string(),
            used: sys.used_memory(),
            total: sys.total_memory(),
        };
        println!(
            "{} RAM used: {} / {}",
            reading.label,
            humansize::format_size(reading.used, humansize::BINARY),
            humansize::format_size(reading.total, humansize::BINARY)
        );
        reading
    }
}

/// Run the allocation check with an NxN f32 buffer
pub fn run_memcheck(registry: &DeviceRegistry, size: usize) -> Result<Vec<MemoryReading>> {
    let mut sys = System::new();
    let mut readings = vec![MemoryReading::take(&mut sys, "Before")];

    let accelerator: Option<&dyn ComputeBackend> = [Device::Cuda, Device::Mps]
        .iter()
        .filter_map(|&d| registry.get(d))
        .find(|b| b.availability().is_available());

    {
        let host = match registry.get(Device::Cpu) {
            Some(cpu) => Some(cpu.random_matrix(size, size)?),
            None => None,
        };
        if let Some(buf) = &host {
            tracing::info!(
                "allocated {} on cpu",
                humansize::format_size(buf.byte_len(), humansize::BINARY)
            );
            readings.push(MemoryReading::take(&mut sys, "After CPU alloc"));
        }

        if let Some(backend) = accelerator {
            let label = format!("After {} alloc", backend.device().name().to_uppercase());
            let device_buf = backend.random_matrix(size, size)?;
            backend.synchronize()?;
            readings.push(MemoryReading::take(&mut sys, &label));
            drop(device_buf);
            let label = format!("After {} free", backend.device().name().to_uppercase());
            readings.push(MemoryReading::take(&mut sys, &label));
        }
    }

    readings.push(MemoryReading::take(&mut sys, "After CPU free"));
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeBackend;
    use crate::device::Availability;

    #[test]
    fn test_memcheck_cpu_only_steps() {
        let registry = DeviceRegistry::with_defaults(Some(1));
        let readings = run_memcheck(&registry, 256).unwrap();
        let labels: Vec<&str> = readings.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Before", "After CPU alloc", "After CPU free"]);
        assert!(readings.iter().all(|r| r.total >= r.used));
    }

    #[test]
    fn test_memcheck_with_accelerator() {
        let mut registry = DeviceRegistry::with_defaults(Some(1));
        registry.register(Box::new(FakeBackend::new(Device::Cuda, Availability::Available)));
        let readings = run_memcheck(&registry, 16).unwrap();
        assert_eq!(readings.len(), 5);
        assert_eq!(readings[2].label, "After CUDA alloc");
        assert_eq!(readings[3].label, "After CUDA free");
    }

    #[test]
    fn test_memcheck_allocation_failure_is_resource_error() {
        let mut registry = DeviceRegistry::new();
        registry.register(Box::new(FakeBackend::failing_alloc(Device::Cpu)));
        assert!(run_memcheck(&registry, 16).unwrap_err().is_resource_error());
    }
}
