//! Host probing
//!
//! Capability snapshot, accelerator detection, memory statistics and the
//! command helpers the probes shell out through.

pub mod accelerator;
pub mod command;
mod memory;
mod resources;

pub use accelerator::{bytes_to_gb, AcceleratorDescriptor, CudaProbe};
pub use memory::MemoryStats;
pub use resources::*;
