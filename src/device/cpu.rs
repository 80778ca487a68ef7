//! Host CPU backend
//!
//! Row-parallel f32 matmul on the rayon pool. Work is finished when
//! `matmul` returns, so `synchronize` has nothing to wait for.

use super::{try_alloc, Availability, ComputeBackend, Device, DeviceBuffer};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::Mutex;

/// Columns of `b` processed per inner block
const COL_BLOCK: usize = 256;

/// CPU compute backend
pub struct CpuBackend {
    rng: Mutex<StdRng>,
}

impl CpuBackend {
    /// Create a backend; a seed makes generated matrices reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ComputeBackend for CpuBackend {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn availability(&self) -> Availability {
        Availability::Available
    }

    fn random_matrix(&self, rows: usize, cols: usize) -> Result<DeviceBuffer> {
        let mut data = try_alloc(Device::Cpu, rows, cols)?;
        {
            // A poisoned lock still holds a usable generator
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            for v in data.iter_mut() {
                *v = rng.gen_range(-1.0f32..1.0f32);
            }
        }
        DeviceBuffer::from_vec(Device::Cpu, rows, cols, data)
    }

    fn matmul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer> {
        self.check_operands(a, b)?;

        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        let mut out = try_alloc(Device::Cpu, m, n)?;
        if m == 0 || n == 0 {
            return DeviceBuffer::from_vec(Device::Cpu, m, n, out);
        }

        let lhs = a.as_slice();
        let rhs = b.as_slice();

        out.par_chunks_mut(n).enumerate().for_each(|(row, out_row)| {
            let a_row = &lhs[row * k..(row + 1) * k];
            for col_start in (0..n).step_by(COL_BLOCK) {
                let col_end = (col_start + COL_BLOCK).min(n);
                let out_block = &mut out_row[col_start..col_end];
                for (p, &a_val) in a_row.iter().enumerate() {
                    let b_block = &rhs[p * n + col_start..p * n + col_end];
                    for (o, &b_val) in out_block.iter_mut().zip(b_block) {
                        *o += a_val * b_val;
                    }
                }
            }
        });

        DeviceBuffer::from_vec(Device::Cpu, m, n, out)
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_small_known_values() {
        let backend = CpuBackend::new(Some(0));
        let a = DeviceBuffer::from_vec(Device::Cpu, 2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = DeviceBuffer::from_vec(Device::Cpu, 3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();

        let c = backend.matmul(&a, &b).unwrap();
        assert_eq!(c.rows(), 2);
        assert_eq!(c.cols(), 2);
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_identity_wider_than_block() {
        let n = COL_BLOCK + 7;
        let backend = CpuBackend::new(Some(3));
        let a = backend.random_matrix(n, n).unwrap();

        let mut eye = vec![0.0f32; n * n];
        for i in 0..n {
            eye[i * n + i] = 1.0;
        }
        let eye = DeviceBuffer::from_vec(Device::Cpu, n, n, eye).unwrap();

        let c = backend.matmul(&a, &eye).unwrap();
        assert_eq!(c.as_slice(), a.as_slice());
    }

    #[test]
    fn test_seeded_matrices_are_reproducible() {
        let a = CpuBackend::new(Some(42)).random_matrix(8, 8).unwrap();
        let b = CpuBackend::new(Some(42)).random_matrix(8, 8).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert!(a.as_slice().iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_rejects_foreign_buffers() {
        let backend = CpuBackend::new(Some(1));
        let a = DeviceBuffer::from_vec(Device::Cuda, 1, 1, vec![1.0]).unwrap();
        let b = backend.random_matrix(1, 1).unwrap();
        assert!(backend.matmul(&a, &b).is_err());
    }

    #[test]
    fn test_cpu_is_always_available() {
        let backend = CpuBackend::default();
        assert_eq!(backend.availability(), Availability::Available);
        assert!(backend.synchronize().is_ok());
    }
}
