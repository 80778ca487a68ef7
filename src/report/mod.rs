//! Benchmark reports
//!
//! A [`Report`] joins the capability snapshot, memory statistics and run
//! summary. [`ReportWriter`] persists it as one JSON document plus two CSV
//! tables, all named with the same [`RunStamp`] prefix:
//!
//! ```text
//! <stamp>_summary.json   full nested report
//! <stamp>_bench.csv      run_idx,device,size,time_s,gflops
//! <stamp>_system.csv     key,value (flattened snapshot)
//! ```

mod flatten;
mod stamp;

pub use flatten::{flatten_snapshot, flatten_value, ACCELERATOR_KEY};
pub use stamp::RunStamp;

use crate::bench::RunSummary;
use crate::error::{BenchError, IoResultExt, Result};
use crate::system::{CapabilitySnapshot, MemoryStats};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Complete result of one benchmark invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Composition time (RFC 3339, UTC)
    pub timestamp: String,
    /// Host capability snapshot
    pub system: CapabilitySnapshot,
    /// Backend-tagged memory statistics
    pub memory: MemoryStats,
    /// Benchmark results
    pub bench: RunSummary,
}

impl Report {
    /// Assemble a report stamped with the current time
    pub fn compose(system: CapabilitySnapshot, bench: RunSummary, memory: MemoryStats) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            system,
            memory,
            bench,
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Load a report from a JSON summary file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&content).map_err(|e| BenchError::ReportError(e.to_string()))
    }
}

/// Output formatting options
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistOptions {
    /// Indent the JSON document
    pub pretty: bool,
}

/// Files written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPaths {
    /// Full JSON document
    pub summary_json: PathBuf,
    /// Per-trial table
    pub bench_csv: PathBuf,
    /// Flattened snapshot table
    pub system_csv: PathBuf,
}

impl PersistedPaths {
    /// All paths, primary first
    pub fn all(&self) -> [&Path; 3] {
        [&self.summary_json, &self.bench_csv, &self.system_csv]
    }
}

/// Writes reports under one directory with one run stamp
#[derive(Debug, Clone)]
pub struct ReportWriter {
    outdir: PathBuf,
    stamp: RunStamp,
    options: PersistOptions,
}

impl ReportWriter {
    /// Writer for `outdir` using `stamp` as the file prefix
    pub fn new(outdir: impl Into<PathBuf>, stamp: RunStamp) -> Self {
        Self {
            outdir: outdir.into(),
            stamp,
            options: PersistOptions::default(),
        }
    }

    /// Set formatting options
    pub fn with_options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    /// Run stamp used for file names
    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    /// Paths this writer will produce
    pub fn paths(&self) -> PersistedPaths {
        PersistedPaths {
            summary_json: self.outdir.join(self.stamp.file_name("summary.json")),
            bench_csv: self.outdir.join(self.stamp.file_name("bench.csv")),
            system_csv: self.outdir.join(self.stamp.file_name("system.csv")),
        }
    }

    /// Create the output directory (if needed) and write all three files
    ///
    /// Existing files with the same stamp are never overwritten; a
    /// same-second collision fails with an I/O error instead. On any
    /// failure the files created by this call are removed again, so a
    /// report set is either complete or absent.
    pub fn persist(&self, report: &Report) -> Result<PersistedPaths> {
        std::fs::create_dir_all(&self.outdir).with_path(&self.outdir)?;
        let paths = self.paths();

        let mut created = Vec::with_capacity(3);
        if let Err(e) = self.write_all(report, &paths, &mut created) {
            for path in &created {
                if let Err(err) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove partial report {}: {}", path.display(), err);
                }
            }
            return Err(e);
        }

        tracing::info!("Wrote reports with prefix {}", self.stamp);
        Ok(paths)
    }

    fn write_all(&self, report: &Report, paths: &PersistedPaths, created: &mut Vec<PathBuf>) -> Result<()> {
        write_json(create_new(&paths.summary_json, created)?, &paths.summary_json, report, self.options.pretty)?;
        write_bench_csv(create_new(&paths.bench_csv, created)?, &paths.bench_csv, &report.bench)?;
        write_system_csv(create_new(&paths.system_csv, created)?, &paths.system_csv, &report.system)?;
        Ok(())
    }
}

/// Persist with a fresh run stamp
pub fn persist(report: &Report, outdir: &Path, options: PersistOptions) -> Result<PersistedPaths> {
    ReportWriter::new(outdir, RunStamp::now())
        .with_options(options)
        .persist(report)
}

/// Open a file that must not exist yet and record it as ours
fn create_new(path: &Path, created: &mut Vec<PathBuf>) -> Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_path(path)?;
    created.push(path.to_path_buf());
    Ok(file)
}

fn write_json(file: File, path: &Path, report: &Report, pretty: bool) -> Result<()> {
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, report)?;
    } else {
        serde_json::to_writer(&mut writer, report)?;
    }
    writer.write_all(b"\n").with_path(path)?;
    writer.flush().with_path(path)?;
    Ok(())
}

fn write_bench_csv(file: File, path: &Path, summary: &RunSummary) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    for sample in &summary.per_run {
        writer.serialize(sample)?;
    }
    writer.flush().with_path(path)?;
    Ok(())
}

fn write_system_csv(file: File, path: &Path, snapshot: &CapabilitySnapshot) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["key", "value"])?;
    for (key, value) in flatten_snapshot(snapshot)? {
        writer.write_record([key, value])?;
    }
    writer.flush().with_path(path)?;
    Ok(())
}
