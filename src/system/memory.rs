//! Accelerator and host memory statistics
//!
//! The report carries one backend-tagged memory record, chosen by the same
//! precedence as accelerator enumeration: CUDA, then Metal, then host RAM.

use super::accelerator::{bytes_to_gb, round2, CudaProbe};
use super::command::{command_stdout, DEFAULT_TIMEOUT};
use crate::device::Availability;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Memory statistics tagged by the backend that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MemoryStats {
    /// CUDA device memory (first device's free/total)
    Cuda {
        /// Free memory on device 0 in GiB
        free_gb: Option<f64>,
        /// Total memory on device 0 in GiB
        total_gb: Option<f64>,
        /// Number of CUDA devices
        device_count: usize,
        /// Device names in driver order
        devices: Vec<String>,
    },
    /// Metal shares memory with the host
    Mps {
        /// Explanation of missing figures
        note: String,
    },
    /// No accelerator; host RAM figures
    Cpu {
        /// Explanation of missing figures
        note: String,
        /// Host RAM total in GiB
        ram_total_gb: Option<f64>,
        /// Host RAM available in GiB
        ram_available_gb: Option<f64>,
    },
}

impl MemoryStats {
    /// Collect stats for the preferred accelerator family
    pub fn collect(cuda: &CudaProbe, mps: Availability) -> Self {
        if cuda.availability.is_available() {
            let query = command_stdout(
                "nvidia-smi",
                &[
                    "--query-gpu=name,memory.free,memory.total",
                    "--format=csv,noheader,nounits",
                ],
                DEFAULT_TIMEOUT,
            );
            match query {
                Some(listing) => Self::from_cuda_listing(&listing),
                None => {
                    tracing::warn!("CUDA memory query failed; reporting device names only");
                    Self::Cuda {
                        free_gb: None,
                        total_gb: None,
                        device_count: cuda.devices.len(),
                        devices: cuda.devices.iter().map(|d| d.name.clone()).collect(),
                    }
                }
            }
        } else if mps.is_available() {
            Self::Mps {
                note: "Metal reports shared memory; exact free/total not available".to_string(),
            }
        } else {
            let mut sys = System::new();
            sys.refresh_memory();
            let total = sys.total_memory();
            Self::Cpu {
                note: "No accelerator detected".to_string(),
                ram_total_gb: (total > 0).then(|| bytes_to_gb(total)),
                ram_available_gb: (total > 0).then(|| bytes_to_gb(sys.available_memory())),
            }
        }
    }

    /// Build CUDA stats from `name, memory.free, memory.total` lines (MiB)
    pub fn from_cuda_listing(listing: &str) -> Self {
        let rows: Vec<Vec<&str>> = listing
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split(',').map(str::trim).collect())
            .collect();

        let mib = |row: Option<&Vec<&str>>, idx: usize| {
            row.and_then(|r| r.get(idx))
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| round2(v / 1024.0))
        };

        Self::Cuda {
            free_gb: mib(rows.first(), 1),
            total_gb: mib(rows.first(), 2),
            device_count: rows.len(),
            devices: rows.iter().filter_map(|r| r.first()).map(|n| n.to_string()).collect(),
        }
    }

    /// Backend tag as written to the report
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Cuda { .. } => "cuda",
            Self::Mps { .. } => "mps",
            Self::Cpu { .. } => "cpu",
        }
    }
}
