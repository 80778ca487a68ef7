//! Configuration module for wsbench
//!
//! Provides CLI arguments and the validated benchmark configuration.

mod settings;

pub use settings::*;
