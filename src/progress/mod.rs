//! Progress reporting module
//!
//! Trial progress bar for benchmark runs.

mod reporter;

pub use reporter::*;
