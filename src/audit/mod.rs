//! Full system audit
//!
//! Runs a fixed set of collectors against the host and writes every fact
//! they find as one row of `system_audit.csv`:
//!
//! ```text
//! category,key,name,value,unit,extra
//! meta,hostname,Hostname,build-07,,
//! memory,total,RAM Total,68719476736,bytes,
//! gpu,nvidia_0,NVIDIA RTX 4090,24564 MiB,,"{""driver"":""550.54""}"
//! ```
//!
//! A collector that fails adds a single `error` row and the audit moves on.

mod host;
mod platform;

use crate::error::{IoResultExt, Result};
use crate::system::command::{self, CommandOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::System;

/// Output file name
pub const AUDIT_FILE_NAME: &str = "system_audit.csv";

/// CSV header
pub const AUDIT_HEADER: [&str; 6] = ["category", "key", "name", "value", "unit", "extra"];

/// One audit fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Grouping (meta, cpu, disk, gpu, error, ...)
    pub category: String,
    /// Identifier within the category
    pub key: String,
    /// Human-readable label
    pub name: String,
    /// Primary value
    pub value: String,
    /// Unit of `value`, may be empty
    pub unit: String,
    /// Additional detail; JSON when structured
    pub extra: String,
}

impl AuditRecord {
    /// Record with no unit and no extra detail
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            name: name.into(),
            value: value.to_string(),
            unit: String::new(),
            extra: String::new(),
        }
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Attach extra detail
    ///
    /// Strings are stored as-is; objects, arrays and scalars are JSON-encoded.
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = match extra {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        };
        self
    }
}

/// Ordered collection of audit records
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn push(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    /// Append the failure row for a collector
    pub fn push_error(&mut self, key: &str, label: &str, message: impl ToString) {
        self.push(AuditRecord::new(
            "error",
            key,
            format!("{} Collector Error", label),
            message,
        ));
    }

    /// Records in collection order
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was collected
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the log as CSV with the standard header
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_path(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(AUDIT_HEADER)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush().with_path(path)?;
        Ok(())
    }
}

/// Shared state handed to every collector
pub struct AuditContext {
    timeout: Duration,
    sys: System,
}

impl AuditContext {
    /// Refresh host state once; CPU usage needs two samples apart
    pub fn new(timeout: Duration) -> Self {
        let mut sys = System::new_all();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_all();
        Self { timeout, sys }
    }

    /// Refreshed host state
    pub fn system(&self) -> &System {
        &self.sys
    }

    /// Base command deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn scaled_timeout(&self, factor: u32) -> Duration {
        self.timeout.saturating_mul(factor)
    }

    /// Run a command with `factor` times the base deadline
    ///
    /// The scaled deadline saturates instead of overflowing.
    /// Returns `Ok(None)` when the command is not installed or exits non-zero.
    /// A timeout is an error.
    pub fn run(&self, cmd: &str, args: &[&str], factor: u32) -> Result<Option<String>> {
        if command::which(cmd).is_none() {
            tracing::debug!("{} not found, skipping", cmd);
            return Ok(None);
        }
        let out: CommandOutput = command::run_command(cmd, args, self.scaled_timeout(factor))?;
        if out.success() {
            Ok(Some(out.stdout))
        } else {
            tracing::debug!("{} exited with {:?}", cmd, out.code);
            Ok(None)
        }
    }
}

type CollectFn = fn(&AuditContext, &mut AuditLog) -> Result<()>;

/// A named audit step
pub struct Collector {
    /// Key used for the error row
    pub key: &'static str,
    /// Label used for the error row
    pub label: &'static str,
    run: CollectFn,
}

impl Collector {
    /// Run this collector, converting failure into an error row
    pub fn collect_into(&self, ctx: &AuditContext, log: &mut AuditLog) {
        let before = log.len();
        if let Err(e) = (self.run)(ctx, log) {
            tracing::warn!("{} collector failed: {}", self.label, e);
            log.push_error(self.key, self.label, e);
        }
        tracing::debug!("{} collector added {} records", self.key, log.len() - before);
    }
}

/// Collectors in output order
pub const COLLECTORS: &[Collector] = &[
    Collector { key: "basic", label: "Basic", run: host::collect_basic },
    Collector { key: "cpu", label: "CPU", run: host::collect_cpu },
    Collector { key: "memory", label: "Memory", run: host::collect_memory },
    Collector { key: "disks", label: "Disk", run: host::collect_disks },
    Collector { key: "gpu", label: "GPU", run: platform::collect_gpu },
    Collector { key: "net", label: "Network", run: host::collect_net },
    Collector { key: "proc", label: "Process", run: host::collect_processes },
    Collector { key: "drivers", label: "Drivers", run: platform::collect_drivers },
    Collector { key: "software", label: "Software", run: platform::collect_software },
    Collector { key: "power", label: "Power", run: platform::collect_power },
    Collector { key: "sensors", label: "Sensors", run: host::collect_sensors },
];

/// Run every collector
pub fn collect_all(ctx: &AuditContext) -> AuditLog {
    let mut log = AuditLog::new();
    for collector in COLLECTORS {
        collector.collect_into(ctx, &mut log);
    }
    log
}

/// Audit the host and write `system_audit.csv` into `dir`
///
/// Returns the written path and the record count.
pub fn run_audit(dir: &Path, timeout: Duration) -> Result<(PathBuf, usize)> {
    std::fs::create_dir_all(dir).with_path(dir)?;
    let path = dir.join(AUDIT_FILE_NAME);

    tracing::info!("Collecting system audit (command timeout {})", humantime::format_duration(timeout));
    let ctx = AuditContext::new(timeout);
    let log = collect_all(&ctx);
    log.write_csv(&path)?;

    tracing::info!("Wrote {} audit records to {}", log.len(), path.display());
    Ok((path, log.len()))
}
