//! Collectors backed by sysinfo

use super::{AuditContext, AuditLog, AuditRecord};
use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::ffi::OsStr;
use sysinfo::{Components, Disks, Networks, System};

const TOP_PROCESSES: usize = 10;

pub(super) fn collect_basic(_ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    log.push(AuditRecord::new(
        "meta",
        "timestamp",
        "UTC Timestamp",
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    ));
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default();
    log.push(AuditRecord::new("meta", "hostname", "Hostname", host));
    log.push(AuditRecord::new("os", "system", "OS", std::env::consts::OS));
    log.push(AuditRecord::new(
        "os",
        "name",
        "OS Name",
        System::name().unwrap_or_default(),
    ));
    log.push(AuditRecord::new(
        "os",
        "version",
        "OS Version",
        System::long_os_version().unwrap_or_default(),
    ));
    log.push(AuditRecord::new(
        "os",
        "kernel",
        "Kernel",
        System::kernel_version().unwrap_or_default(),
    ));
    log.push(AuditRecord::new(
        "runtime",
        env!("CARGO_PKG_NAME"),
        "Audit Tool",
        env!("CARGO_PKG_VERSION"),
    ));
    Ok(())
}

pub(super) fn collect_cpu(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let sys = ctx.system();
    log.push(AuditRecord::new("cpu", "machine", "Machine", std::env::consts::ARCH));
    if let Some(cpu) = sys.cpus().first() {
        log.push(AuditRecord::new("cpu", "brand", "CPU Brand", cpu.brand().trim()));
        log.push(AuditRecord::new("cpu", "vendor", "CPU Vendor", cpu.vendor_id()));
    }
    if let Some(physical) = sys.physical_core_count() {
        log.push(AuditRecord::new("cpu", "physical_cores", "Physical Cores", physical));
    }
    log.push(AuditRecord::new("cpu", "logical_cores", "Logical Cores", sys.cpus().len()));

    let freqs: Vec<u64> = sys.cpus().iter().map(|c| c.frequency()).collect();
    if let Some(&max) = freqs.iter().max() {
        let mean = freqs.iter().sum::<u64>() / freqs.len() as u64;
        log.push(AuditRecord::new("cpu", "freq_current", "CPU Frequency Current", mean).with_unit("MHz"));
        log.push(AuditRecord::new("cpu", "freq_max", "CPU Frequency Max", max).with_unit("MHz"));
    }

    log.push(
        AuditRecord::new("cpu", "usage", "CPU Usage", round1(sys.global_cpu_usage() as f64))
            .with_unit("%"),
    );
    Ok(())
}

pub(super) fn collect_memory(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let sys = ctx.system();
    let total = sys.total_memory();
    log.push(AuditRecord::new("memory", "total", "RAM Total", total).with_unit("bytes"));
    log.push(AuditRecord::new("memory", "available", "RAM Available", sys.available_memory()).with_unit("bytes"));
    log.push(AuditRecord::new("memory", "used", "RAM Used", sys.used_memory()).with_unit("bytes"));
    log.push(AuditRecord::new("memory", "percent", "RAM Used %", percent(sys.used_memory(), total)).with_unit("%"));

    let swap = sys.total_swap();
    log.push(AuditRecord::new("swap", "total", "Swap Total", swap).with_unit("bytes"));
    log.push(AuditRecord::new("swap", "used", "Swap Used", sys.used_swap()).with_unit("bytes"));
    log.push(AuditRecord::new("swap", "percent", "Swap Used %", percent(sys.used_swap(), swap)).with_unit("%"));
    Ok(())
}

pub(super) fn collect_disks(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let disks = Disks::new_with_refreshed_list();
    for disk in disks.iter() {
        let total = disk.total_space();
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        log.push(
            AuditRecord::new(
                "disk",
                lossy(disk.name()),
                "Partition",
                disk.mount_point().display(),
            )
            .with_extra(json!({
                "fstype": lossy(disk.file_system()),
                "kind": format!("{:?}", disk.kind()),
                "removable": disk.is_removable(),
                "total": total,
                "used": used,
                "free": free,
                "percent": percent(used, total),
            })),
        );
    }

    if cfg!(target_os = "linux") {
        if let Some(out) = ctx.run("lsblk", &["-J", "-o", "NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE,MODEL"], 1)? {
            if let Ok(data) = serde_json::from_str::<Value>(&out) {
                log.push(AuditRecord::new("disk", "lsblk", "lsblk", "ok").with_extra(data));
            }
        }
    }
    Ok(())
}

pub(super) fn collect_net(_ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<_> = networks.iter().collect();
    interfaces.sort_by(|a, b| a.0.cmp(b.0));

    for (name, data) in interfaces {
        log.push(
            AuditRecord::new("net", name.as_str(), "Interface", data.mac_address()).with_extra(json!({
                "io": {
                    "bytes_sent": data.total_transmitted(),
                    "bytes_recv": data.total_received(),
                    "packets_sent": data.total_packets_transmitted(),
                    "packets_recv": data.total_packets_received(),
                },
                "errors_in": data.total_errors_on_received(),
                "errors_out": data.total_errors_on_transmitted(),
            })),
        );
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct ProcessEntry {
    pid: u32,
    name: String,
    cpu_percent: f64,
    memory_percent: f64,
}

impl ProcessEntry {
    fn to_json(&self) -> Value {
        json!({
            "pid": self.pid,
            "name": self.name,
            "cpu_percent": round1(self.cpu_percent),
            "memory_percent": round1(self.memory_percent),
        })
    }
}

pub(super) fn collect_processes(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let sys = ctx.system();
    let total = sys.total_memory();
    let procs: Vec<ProcessEntry> = sys
        .processes()
        .values()
        .map(|p| ProcessEntry {
            pid: p.pid().as_u32(),
            name: lossy(p.name()),
            cpu_percent: p.cpu_usage() as f64,
            memory_percent: percent(p.memory(), total),
        })
        .collect();

    let top_cpu = top_by(&procs, |p| p.cpu_percent);
    let top_mem = top_by(&procs, |p| p.memory_percent);
    log.push(AuditRecord::new("proc", "top_cpu", "Top CPU Procs", top_cpu.len()).with_extra(entries(&top_cpu)));
    log.push(AuditRecord::new("proc", "top_mem", "Top MEM Procs", top_mem.len()).with_extra(entries(&top_mem)));
    Ok(())
}

pub(super) fn collect_sensors(_ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    let components = Components::new_with_refreshed_list();
    let mut temps = Map::new();
    for component in components.iter() {
        temps.insert(
            component.label().to_string(),
            json!({
                "current": component.temperature(),
                "high": component.max(),
                "critical": component.critical(),
            }),
        );
    }
    if !temps.is_empty() {
        log.push(
            AuditRecord::new("sensors", "temperatures", "Temperatures", "ok")
                .with_unit("C")
                .with_extra(Value::Object(temps)),
        );
    }
    Ok(())
}

fn top_by(procs: &[ProcessEntry], key: impl Fn(&ProcessEntry) -> f64) -> Vec<ProcessEntry> {
    let mut sorted = procs.to_vec();
    sorted.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    sorted.truncate(TOP_PROCESSES);
    sorted
}

fn entries(procs: &[ProcessEntry]) -> Value {
    Value::Array(procs.iter().map(ProcessEntry::to_json).collect())
}

fn lossy(s: impl AsRef<OsStr>) -> String {
    s.as_ref().to_string_lossy().into_owned()
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 * 100.0 / whole as f64)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, cpu: f64, mem: f64) -> ProcessEntry {
        ProcessEntry {
            pid,
            name: format!("p{}", pid),
            cpu_percent: cpu,
            memory_percent: mem,
        }
    }

    #[test]
    fn test_top_by_orders_descending_and_truncates() {
        let procs: Vec<ProcessEntry> = (0..15).map(|i| entry(i, i as f64, (15 - i) as f64)).collect();

        let cpu = top_by(&procs, |p| p.cpu_percent);
        assert_eq!(cpu.len(), TOP_PROCESSES);
        assert_eq!(cpu[0].pid, 14);
        assert!(cpu.windows(2).all(|w| w[0].cpu_percent >= w[1].cpu_percent));

        let mem = top_by(&procs, |p| p.memory_percent);
        assert_eq!(mem[0].pid, 0);
    }

    #[test]
    fn test_top_by_tolerates_nan() {
        let procs = vec![entry(1, f64::NAN, 0.0), entry(2, 5.0, 0.0)];
        assert_eq!(top_by(&procs, |p| p.cpu_percent).len(), 2);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 3), 33.3);
    }

    #[test]
    fn test_basic_collector_rows() {
        let ctx = AuditContext {
            timeout: std::time::Duration::from_secs(1),
            sys: System::new(),
        };
        let mut log = AuditLog::new();
        collect_basic(&ctx, &mut log).unwrap();
        let keys: Vec<&str> = log.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(&keys[..3], &["timestamp", "hostname", "system"]);
        assert!(log.records()[0].value.ends_with('Z'));
        assert_eq!(log.records()[2].value, std::env::consts::OS);
    }
}
