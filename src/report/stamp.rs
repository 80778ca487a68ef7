//! Run identifier shared by all output files of one invocation

use chrono::{DateTime, Utc};
use std::fmt;

/// Filesystem-safe UTC timestamp token, second precision
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunStamp(String);

impl RunStamp {
    /// Format used for file prefixes
    pub const FORMAT: &'static str = "%Y-%m-%dT%H-%M-%SZ";

    /// Stamp for the current instant
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Stamp for a given instant
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(Self::FORMAT).to_string())
    }

    /// Token text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<stamp>_<suffix>` file name
    pub fn file_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.0, suffix)
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
