//! Accelerator detection
//!
//! CUDA devices are enumerated through `nvidia-smi`; Apple Metal (MPS) is
//! inferred from the platform. Every query answers with an
//! [`Availability`] instead of failing.

use super::command::{command_stdout, which, DEFAULT_TIMEOUT};
use crate::device::Availability;
use serde::{Deserialize, Serialize};

/// Display name used for the Metal pseudo-device
pub const MPS_DEVICE_NAME: &str = "Apple MPS (Metal)";

const MIB_PER_GIB: f64 = 1024.0;

/// One detected accelerator device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorDescriptor {
    /// Device name as reported by the driver
    pub name: String,
    /// Total device memory in GiB, when the backend reports it
    pub memory_gb: Option<f64>,
    /// Compute capability (e.g. "8.6")
    pub capability: Option<String>,
}

/// Outcome of probing the CUDA family
#[derive(Debug, Clone)]
pub struct CudaProbe {
    /// Whether CUDA devices are usable
    pub availability: Availability,
    /// Detected devices in driver order
    pub devices: Vec<AcceleratorDescriptor>,
    /// CUDA version reported by the driver
    pub cuda_version: Option<String>,
}

impl CudaProbe {
    /// Query `nvidia-smi` for devices and driver CUDA version
    pub fn detect() -> Self {
        if which("nvidia-smi").is_none() {
            return Self::unavailable();
        }

        let query = command_stdout(
            "nvidia-smi",
            &[
                "--query-gpu=name,memory.total,compute_cap",
                "--format=csv,noheader,nounits",
            ],
            DEFAULT_TIMEOUT,
        );

        let Some(listing) = query else {
            tracing::warn!("nvidia-smi is installed but the device query failed");
            return Self {
                availability: Availability::Unknown,
                devices: Vec::new(),
                cuda_version: None,
            };
        };

        let devices = parse_gpu_listing(&listing);
        let cuda_version = command_stdout("nvidia-smi", &[], DEFAULT_TIMEOUT)
            .and_then(|banner| parse_cuda_version(&banner));

        Self {
            availability: if devices.is_empty() {
                Availability::Unavailable
            } else {
                Availability::Available
            },
            devices,
            cuda_version,
        }
    }

    fn unavailable() -> Self {
        Self {
            availability: Availability::Unavailable,
            devices: Vec::new(),
            cuda_version: None,
        }
    }
}

/// Whether Metal Performance Shaders can be used on this host
pub fn detect_mps() -> Availability {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Availability::Available
    } else if cfg!(target_os = "macos") {
        // Intel Macs only have MPS with a Metal-capable discrete GPU
        match command_stdout("system_profiler", &["SPDisplaysDataType"], DEFAULT_TIMEOUT) {
            Some(out) if out.contains("Metal") => Availability::Available,
            Some(_) => Availability::Unavailable,
            None => Availability::Unknown,
        }
    } else {
        Availability::Unavailable
    }
}

/// Accelerator list: CUDA devices if any, else the Metal device, else empty
pub fn enumerate(cuda: &CudaProbe, mps: Availability) -> Vec<AcceleratorDescriptor> {
    if cuda.availability.is_available() {
        cuda.devices.clone()
    } else if mps.is_available() {
        vec![AcceleratorDescriptor {
            name: MPS_DEVICE_NAME.to_string(),
            memory_gb: None,
            capability: None,
        }]
    } else {
        Vec::new()
    }
}

/// Parse `name, memory.total [MiB], compute_cap` CSV lines
pub fn parse_gpu_listing(listing: &str) -> Vec<AcceleratorDescriptor> {
    listing
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let cols: Vec<&str> = line.split(',').map(str::trim).collect();
            let name = cols.first().filter(|n| !n.is_empty())?.to_string();
            let memory_gb = cols
                .get(1)
                .and_then(|m| m.parse::<f64>().ok())
                .map(|mib| round2(mib / MIB_PER_GIB));
            let capability = cols
                .get(2)
                .filter(|c| !c.is_empty() && !c.starts_with('['))
                .map(|c| c.to_string());
            Some(AcceleratorDescriptor {
                name,
                memory_gb,
                capability,
            })
        })
        .collect()
}

/// Extract "12.2" from the `CUDA Version: 12.2` banner field
pub fn parse_cuda_version(banner: &str) -> Option<String> {
    let (_, rest) = banner.split_once("CUDA Version:")?;
    let version: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

/// Round to two decimals, the precision used in reports
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert bytes to GiB rounded to two decimals
pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpu_listing() {
        let listing = "NVIDIA GeForce RTX 4090, 24564, 8.9\nNVIDIA A100-SXM4-80GB, 81920, 8.0\n";
        let gpus = parse_gpu_listing(listing);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].name, "NVIDIA GeForce RTX 4090");
        assert_eq!(gpus[0].memory_gb, Some(23.99));
        assert_eq!(gpus[0].capability.as_deref(), Some("8.9"));
        assert_eq!(gpus[1].memory_gb, Some(80.0));
    }

    #[test]
    fn test_parse_gpu_listing_tolerates_missing_fields() {
        let gpus = parse_gpu_listing("Tesla K80, [N/A], [N/A]\n\n, 100, 1.0\n");
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].name, "Tesla K80");
        assert_eq!(gpus[0].memory_gb, None);
        assert_eq!(gpus[0].capability, None);
    }

    #[test]
    fn test_parse_cuda_version() {
        let banner = "| NVIDIA-SMI 535.104.05   Driver Version: 535.104.05   CUDA Version: 12.2     |";
        assert_eq!(parse_cuda_version(banner).as_deref(), Some("12.2"));
        assert_eq!(parse_cuda_version("no version here"), None);
    }

    #[test]
    fn test_enumerate_prefers_cuda_then_mps() {
        let cuda = CudaProbe {
            availability: Availability::Available,
            devices: parse_gpu_listing("GPU A, 1024, 7.5"),
            cuda_version: Some("12.0".into()),
        };
        let list = enumerate(&cuda, Availability::Available);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "GPU A");

        let none = CudaProbe::unavailable();
        let list = enumerate(&none, Availability::Available);
        assert_eq!(list[0].name, MPS_DEVICE_NAME);
        assert!(list[0].memory_gb.is_none());

        assert!(enumerate(&none, Availability::Unknown).is_empty());
    }

    #[test]
    fn test_bytes_to_gb() {
        assert_eq!(bytes_to_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(bytes_to_gb(3 * 512 * 1024 * 1024), 1.5);
        assert_eq!(round2(1.23456), 1.23);
    }
}
