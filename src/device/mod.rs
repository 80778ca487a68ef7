//! Compute devices and backends
//!
//! A [`Device`] names where a workload runs; a [`ComputeBackend`] is the
//! runtime that can allocate buffers on that device, multiply them and
//! wait for outstanding work. Backends are passed explicitly to every
//! operation so tests can substitute their own.

mod cpu;

pub use cpu::CpuBackend;

use crate::config::DeviceChoice;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete compute device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host CPU
    Cpu,
    /// NVIDIA CUDA GPU
    Cuda,
    /// Apple Metal Performance Shaders
    Mps,
}

impl Device {
    /// Resolution order used for `auto`
    pub const PRIORITY: [Device; 3] = [Device::Cuda, Device::Mps, Device::Cpu];

    /// Short identifier used in reports
    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
        }
    }

    /// Kernel launches return before the work is done
    pub fn is_async(&self) -> bool {
        !matches!(self, Device::Cpu)
    }

    /// Device for an explicit (non-auto) choice
    pub fn from_choice(choice: DeviceChoice) -> Option<Self> {
        match choice {
            DeviceChoice::Auto => None,
            DeviceChoice::Cpu => Some(Device::Cpu),
            DeviceChoice::Cuda => Some(Device::Cuda),
            DeviceChoice::Mps => Some(Device::Mps),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of asking whether a backend or device family is usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Present and usable
    Available,
    /// Definitely absent
    Unavailable,
    /// The query itself failed
    Unknown,
}

impl Availability {
    /// Only `Available` counts as usable
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Row-major f32 matrix resident on a specific device
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    device: Device,
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DeviceBuffer {
    /// Wrap existing data; `data.len()` must equal `rows * cols`
    pub fn from_vec(device: Device, rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(BenchError::ShapeMismatch(format!(
                "{} elements cannot form a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            device,
            rows,
            cols,
            data,
        })
    }

    /// Device holding this buffer
    pub fn device(&self) -> Device {
        self.device
    }

    /// Row count
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Raw row-major contents
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Size in bytes
    pub fn byte_len(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<f32>()) as u64
    }

    /// Arithmetic mean of all elements
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }
}

/// Allocate a zeroed `rows x cols` buffer, reporting failure instead of aborting
pub(crate) fn try_alloc(device: Device, rows: usize, cols: usize) -> Result<Vec<f32>> {
    let alloc_failed = || BenchError::AllocationFailed {
        device: device.name().to_string(),
        rows,
        cols,
        bytes: (rows as u64)
            .saturating_mul(cols as u64)
            .saturating_mul(std::mem::size_of::<f32>() as u64),
    };

    let len = rows.checked_mul(cols).ok_or_else(alloc_failed)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| alloc_failed())?;
    data.resize(len, 0.0);
    Ok(data)
}

/// Numeric runtime for one device
pub trait ComputeBackend: Send + Sync {
    /// Device this backend drives
    fn device(&self) -> Device;

    /// Whether this backend can run work on this host
    fn availability(&self) -> Availability;

    /// Allocate a buffer filled from the device's random number generator
    fn random_matrix(&self, rows: usize, cols: usize) -> Result<DeviceBuffer>;

    /// Multiply `a` by `b`; may return before the work completes on async devices
    fn matmul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer>;

    /// Block until all previously issued work has completed
    fn synchronize(&self) -> Result<()>;

    /// Reject buffers that live elsewhere or cannot be multiplied
    fn check_operands(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<()> {
        for buf in [a, b] {
            if buf.device() != self.device() {
                return Err(BenchError::ShapeMismatch(format!(
                    "buffer on {} passed to {} backend",
                    buf.device(),
                    self.device()
                )));
            }
        }
        if a.cols() != b.rows() {
            return Err(BenchError::ShapeMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                a.rows(),
                a.cols(),
                b.rows(),
                b.cols()
            )));
        }
        Ok(())
    }
}

/// Set of backends compiled into this binary
pub struct DeviceRegistry {
    backends: Vec<Box<dyn ComputeBackend>>,
}

impl DeviceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Registry with every built-in backend
    pub fn with_defaults(seed: Option<u64>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CpuBackend::new(seed)));
        registry
    }

    /// Add a backend, replacing any existing one for the same device
    pub fn register(&mut self, backend: Box<dyn ComputeBackend>) {
        self.backends.retain(|b| b.device() != backend.device());
        self.backends.push(backend);
    }

    /// Backend for a device, if registered
    pub fn get(&self, device: Device) -> Option<&dyn ComputeBackend> {
        self.backends
            .iter()
            .find(|b| b.device() == device)
            .map(|b| b.as_ref())
    }

    /// Availability of a device's backend
    pub fn availability(&self, device: Device) -> Availability {
        self.get(device)
            .map(|b| b.availability())
            .unwrap_or(Availability::Unavailable)
    }

    /// Pick the backend for a CLI device choice
    ///
    /// `auto` walks [`Device::PRIORITY`] and takes the first available
    /// backend. An explicit choice must be registered and available.
    pub fn resolve(&self, choice: DeviceChoice) -> Result<&dyn ComputeBackend> {
        match Device::from_choice(choice) {
            None => Device::PRIORITY
                .iter()
                .filter_map(|&d| self.get(d))
                .find(|b| b.availability().is_available())
                .ok_or_else(|| {
                    BenchError::BackendUnavailable("no usable compute backend registered".into())
                }),
            Some(device) => {
                let backend = self.get(device).ok_or_else(|| {
                    BenchError::BackendUnavailable(format!(
                        "no {} backend is built into this binary",
                        device
                    ))
                })?;
                match backend.availability() {
                    Availability::Available => Ok(backend),
                    other => Err(BenchError::BackendUnavailable(format!(
                        "{} backend reports {:?}",
                        device, other
                    ))),
                }
            }
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::with_defaults(None)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable backend for pipeline tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that multiplies on the host but pretends to be any device
    pub struct FakeBackend {
        pub device: Device,
        pub availability: Availability,
        pub fail_alloc: bool,
        pub matmuls: AtomicUsize,
        pub syncs: AtomicUsize,
    }

    impl FakeBackend {
        pub fn new(device: Device, availability: Availability) -> Self {
            Self {
                device,
                availability,
                fail_alloc: false,
                matmuls: AtomicUsize::new(0),
                syncs: AtomicUsize::new(0),
            }
        }

        pub fn failing_alloc(device: Device) -> Self {
            Self {
                fail_alloc: true,
                ..Self::new(device, Availability::Available)
            }
        }

        pub fn matmul_count(&self) -> usize {
            self.matmuls.load(Ordering::SeqCst)
        }

        pub fn sync_count(&self) -> usize {
            self.syncs.load(Ordering::SeqCst)
        }
    }

    impl ComputeBackend for FakeBackend {
        fn device(&self) -> Device {
            self.device
        }

        fn availability(&self) -> Availability {
            self.availability
        }

        fn random_matrix(&self, rows: usize, cols: usize) -> Result<DeviceBuffer> {
            if self.fail_alloc {
                return Err(BenchError::AllocationFailed {
                    device: self.device.name().to_string(),
                    rows,
                    cols,
                    bytes: (rows * cols * 4) as u64,
                });
            }
            DeviceBuffer::from_vec(self.device, rows, cols, vec![1.0; rows * cols])
        }

        fn matmul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer> {
            self.check_operands(a, b)?;
            self.matmuls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_micros(50));
            DeviceBuffer::from_vec(
                self.device,
                a.rows(),
                b.cols(),
                vec![a.cols() as f32; a.rows() * b.cols()],
            )
        }

        fn synchronize(&self) -> Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
