//! Error types for wsbench
//!
//! Every failure that halts a benchmark run is a [`BenchError`]. Optional
//! probe failures are not errors: they degrade to absent fields and a
//! warning in the log.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wsbench operations
#[derive(Error, Debug)]
pub enum BenchError {
    /// I/O error while writing reports or reading system files
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested compute backend is not present on this host or not built in
    #[error("Compute backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Device name that no backend understands
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// Configuration error (bad size, run count, paths)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Buffer allocation failed on the target device
    #[error("Failed to allocate {rows}x{cols} matrix ({bytes} bytes) on {device}")]
    AllocationFailed {
        device: String,
        rows: usize,
        cols: usize,
        bytes: u64,
    },

    /// Matrix shapes that cannot be multiplied together
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Summary requested over zero timing samples
    #[error("Cannot summarize an empty set of timing samples")]
    EmptySamples,

    /// Report serialization error (JSON or CSV)
    #[error("Report error: {0}")]
    ReportError(String),

    /// External command failed or timed out
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BenchError>,
    },
}

impl BenchError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a command failure
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Rejected before any allocation happened
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::ConfigError(_) | Self::UnsupportedDevice(_) => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }

    /// Device ran out of memory or refused an allocation
    pub fn is_resource_error(&self) -> bool {
        match self {
            Self::AllocationFailed { .. } => true,
            Self::WithContext { source, .. } => source.is_resource_error(),
            _ => false,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::WithContext { source, .. } => source.exit_code(),
            Self::ConfigError(_) | Self::UnsupportedDevice(_) => 2,
            Self::AllocationFailed { .. } => 3,
            Self::EmptySamples | Self::ShapeMismatch(_) => 4,
            _ => 1,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for wsbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::ReportError(err.to_string())
    }
}

impl From<csv::Error> for BenchError {
    fn from(err: csv::Error) -> Self {
        BenchError::ReportError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BenchError::io(path, e))
    }
}
