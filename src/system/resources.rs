//! System capability snapshot
//!
//! Collects OS, CPU, RAM and accelerator facts once per run. Each optional
//! fact is gathered independently; a failed query leaves its field empty
//! and the rest of the snapshot is still produced.

use super::accelerator::{self, bytes_to_gb, AcceleratorDescriptor, CudaProbe};
use super::memory::MemoryStats;
use crate::device::{Availability, Device, DeviceRegistry};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Immutable capability snapshot of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Collection time (RFC 3339, UTC)
    pub timestamp: String,
    /// Operating system family (linux, macos, windows)
    pub os: String,
    /// Kernel release
    pub os_release: Option<String>,
    /// Long OS version string
    pub os_version: Option<String>,
    /// CPU architecture
    pub arch: String,
    /// Tool name and version
    pub runtime: String,
    /// Compute backends built into this binary
    pub compute_backends: String,
    /// CUDA devices usable
    pub cuda_available: bool,
    /// Metal (MPS) usable
    pub mps_available: bool,
    /// Driver-reported CUDA version
    pub cuda_version: Option<String>,
    /// Logical CPU count
    pub cpu_logical: Option<usize>,
    /// Physical core count
    pub cpu_physical: Option<usize>,
    /// Total RAM in GiB
    pub ram_total_gb: Option<f64>,
    /// Available RAM in GiB
    pub ram_available_gb: Option<f64>,
    /// Detected accelerators in detection order
    pub accelerators: Vec<AcceleratorDescriptor>,
}

/// Raw accelerator probe results, reused for memory statistics
#[derive(Debug, Clone)]
pub struct Probe {
    /// CUDA family result
    pub cuda: CudaProbe,
    /// Metal family result
    pub mps: Availability,
}

impl Probe {
    /// Query both accelerator families
    pub fn detect() -> Self {
        let cuda = CudaProbe::detect();
        let mps = accelerator::detect_mps();
        tracing::debug!("accelerator probe: cuda={:?} mps={:?}", cuda.availability, mps);
        Self { cuda, mps }
    }

    /// Probe result for a host without accelerators
    pub fn host_only() -> Self {
        Self {
            cuda: CudaProbe {
                availability: Availability::Unavailable,
                devices: Vec::new(),
                cuda_version: None,
            },
            mps: Availability::Unavailable,
        }
    }

    /// Build the capability snapshot
    pub fn snapshot(&self, registry: &DeviceRegistry) -> CapabilitySnapshot {
        let mut sys = System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        let (ram_total_gb, ram_available_gb) = if total > 0 {
            (Some(bytes_to_gb(total)), Some(bytes_to_gb(sys.available_memory())))
        } else {
            tracing::warn!("RAM size could not be determined");
            (None, None)
        };

        let compute_backends = Device::PRIORITY
            .iter()
            .rev()
            .filter(|&&d| registry.get(d).is_some())
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(",");

        CapabilitySnapshot {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            os: std::env::consts::OS.to_string(),
            os_release: System::kernel_version(),
            os_version: System::long_os_version(),
            arch: std::env::consts::ARCH.to_string(),
            runtime: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            compute_backends,
            cuda_available: self.cuda.availability.is_available(),
            mps_available: self.mps.is_available(),
            cuda_version: self.cuda.cuda_version.clone(),
            cpu_logical: nonzero(num_cpus::get()),
            cpu_physical: nonzero(num_cpus::get_physical()),
            ram_total_gb,
            ram_available_gb,
            accelerators: accelerator::enumerate(&self.cuda, self.mps),
        }
    }

    /// Memory statistics for the preferred accelerator family
    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats::collect(&self.cuda, self.mps)
    }
}

impl CapabilitySnapshot {
    /// Probe the host and build a snapshot in one step
    pub fn collect(registry: &DeviceRegistry) -> Self {
        Probe::detect().snapshot(registry)
    }

    /// Print snapshot to console
    pub fn print_summary(&self) {
        println!("=== System Information ===\n");
        println!("OS:           {} {}", self.os, self.os_release.as_deref().unwrap_or("unknown"));
        if let Some(version) = &self.os_version {
            println!("Version:      {}", version);
        }
        println!("Arch:         {}", self.arch);
        println!("Runtime:      {}", self.runtime);
        println!("Backends:     {}", self.compute_backends);

        println!("\nCPU:");
        println!("  Logical cores:  {}", opt(self.cpu_logical));
        println!("  Physical cores: {}", opt(self.cpu_physical));

        println!("\nMemory:");
        println!("  Total:     {} GiB", opt(self.ram_total_gb));
        println!("  Available: {} GiB", opt(self.ram_available_gb));

        println!("\nAccelerators:");
        println!("  CUDA available: {}", self.cuda_available);
        println!("  MPS available:  {}", self.mps_available);
        if let Some(version) = &self.cuda_version {
            println!("  CUDA version:   {}", version);
        }
        for (i, acc) in self.accelerators.iter().enumerate() {
            println!(
                "  [{}] {} (memory: {} GiB, capability: {})",
                i,
                acc.name,
                opt(acc.memory_gb),
                acc.capability.as_deref().unwrap_or("n/a")
            );
        }
    }
}

fn nonzero(n: usize) -> Option<usize> {
    (n > 0).then_some(n)
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_on_host_only_probe() {
        let registry = DeviceRegistry::with_defaults(Some(0));
        let snap = Probe::host_only().snapshot(&registry);

        assert!(!snap.cuda_available);
        assert!(!snap.mps_available);
        assert!(snap.accelerators.is_empty());
        assert_eq!(snap.compute_backends, "cpu");
        assert_eq!(snap.arch, std::env::consts::ARCH);
        assert!(snap.cpu_logical.unwrap_or(1) > 0);
        assert!(snap.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_snapshot_serializes_every_field() {
        let registry = DeviceRegistry::with_defaults(Some(0));
        let snap = Probe::host_only().snapshot(&registry);
        let json = serde_json::to_value(&snap).unwrap();
        for key in [
            "timestamp",
            "os",
            "os_release",
            "arch",
            "runtime",
            "cuda_available",
            "mps_available",
            "cuda_version",
            "cpu_logical",
            "cpu_physical",
            "ram_total_gb",
            "ram_available_gb",
            "accelerators",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_host_only_memory_stats() {
        assert_eq!(Probe::host_only().memory_stats().backend(), "cpu");
    }
}
