//! Collectors backed by OS utilities
//!
//! Each collector picks the tool for the running OS. Missing tools are
//! skipped; a tool that hangs past its deadline fails the collector.

use super::{AuditContext, AuditLog, AuditRecord};
use crate::error::Result;
use serde_json::{json, Value};

// Deadline multipliers relative to the base command timeout
const PROFILER: u32 = 2;
const DRIVERS: u32 = 4;
const SOFTWARE: u32 = 6;

const WMIC_GPU_FIELDS: &str = "Name,AdapterRAM,DriverVersion,DriverDate";

pub(super) fn collect_gpu(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    match std::env::consts::OS {
        "windows" => {
            let args = ["path", "win32_VideoController", "get", WMIC_GPU_FIELDS, "/format:csv"];
            if let Some(out) = ctx.run("wmic", &args, 1)? {
                for record in parse_wmic_gpus(&out) {
                    log.push(record);
                }
            }
        }
        "macos" => {
            if let Some(out) = ctx.run("system_profiler", &["SPDisplaysDataType", "-json"], PROFILER)? {
                if let Ok(data) = serde_json::from_str::<Value>(&out) {
                    let gpus = data["SPDisplaysDataType"].as_array().cloned().unwrap_or_default();
                    for (i, gpu) in gpus.into_iter().enumerate() {
                        let name = gpu["_name"].as_str().unwrap_or("GPU").to_string();
                        let vram = gpu["spdisplays_vram"].as_str().unwrap_or_default().to_string();
                        log.push(AuditRecord::new("gpu", format!("gpu_{}", i), name, vram).with_extra(gpu));
                    }
                }
            }
        }
        _ => {
            if let Some(out) = ctx.run("lspci", &[], 1)? {
                for (i, line) in pci_display_devices(&out).into_iter().enumerate() {
                    log.push(AuditRecord::new("gpu", format!("gpu_{}", i), "PCI GPU", line));
                }
            }
            let args = ["--query-gpu=name,memory.total,driver_version", "--format=csv,noheader"];
            if let Some(out) = ctx.run("nvidia-smi", &args, 1)? {
                for record in parse_nvidia_gpus(&out) {
                    log.push(record);
                }
            }
        }
    }
    Ok(())
}

pub(super) fn collect_drivers(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    match std::env::consts::OS {
        "windows" => {
            let script = "Get-WmiObject Win32_PnPSignedDriver | \
                          Select-Object DeviceName,DriverVersion,DriverDate,Manufacturer | ConvertTo-Json";
            let json = ctx
                .run("powershell", &powershell(script), DRIVERS)?
                .and_then(|out| serde_json::from_str::<Value>(&out).ok());
            match json {
                Some(data) => log.push(
                    AuditRecord::new("drivers", "pnpsigned", "PNP Signed Drivers", "ok").with_extra(data),
                ),
                None => {
                    if let Some(out) = ctx.run("pnputil", &["/enum-drivers"], DRIVERS)? {
                        log.push(AuditRecord::new("drivers", "pnputil", "PnPUtil", "ok").with_extra(Value::String(out)));
                    }
                }
            }
        }
        "macos" => {
            if let Some(out) = ctx.run("system_profiler", &["SPExtensionsDataType", "-json"], DRIVERS)? {
                if let Ok(data) = serde_json::from_str::<Value>(&out) {
                    log.push(AuditRecord::new("drivers", "kexts", "Kernel Extensions", "ok").with_extra(data));
                }
            }
        }
        _ => {
            if let Some(out) = ctx.run("lsmod", &[], 1)? {
                log.push(AuditRecord::new("drivers", "lsmod", "Kernel Modules", "ok").with_extra(Value::String(out)));
            }
        }
    }
    Ok(())
}

pub(super) fn collect_software(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    match std::env::consts::OS {
        "windows" => {
            let script = "Get-ItemProperty \
                          HKLM:Software\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\*, \
                          HKLM:Software\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\* | \
                          Select-Object DisplayName,DisplayVersion,Publisher,InstallDate | ConvertTo-Json";
            if let Some(out) = ctx.run("powershell", &powershell(script), SOFTWARE)? {
                if let Ok(data) = serde_json::from_str::<Value>(&out) {
                    log.push(AuditRecord::new("software", "installed", "Installed Apps", "ok").with_extra(data));
                }
            }
        }
        "macos" => {
            if let Some(out) = ctx.run("system_profiler", &["SPApplicationsDataType", "-json"], SOFTWARE)? {
                if let Ok(data) = serde_json::from_str::<Value>(&out) {
                    log.push(AuditRecord::new("software", "apps", "Applications", "ok").with_extra(data));
                }
            }
        }
        _ => {
            let dpkg = ctx.run("dpkg-query", &["-W", "-f", "${Package} ${Version}\n"], SOFTWARE)?;
            if let Some(out) = dpkg {
                log.push(
                    AuditRecord::new("software", "dpkg", "Deb Packages", out.lines().count())
                        .with_extra(Value::String(out)),
                );
            } else if let Some(out) =
                ctx.run("rpm", &["-qa", "--qf", "%{NAME} %{VERSION}-%{RELEASE}\n"], SOFTWARE)?
            {
                log.push(
                    AuditRecord::new("software", "rpm", "RPM Packages", out.lines().count())
                        .with_extra(Value::String(out)),
                );
            }
        }
    }
    Ok(())
}

pub(super) fn collect_power(ctx: &AuditContext, log: &mut AuditLog) -> Result<()> {
    match std::env::consts::OS {
        "windows" => {
            if let Some(out) = ctx.run("wmic", &["path", "Win32_Battery", "get", "*", "/format:csv"], 1)? {
                if !out.is_empty() {
                    log.push(AuditRecord::new("power", "battery", "Battery (WMIC)", "ok").with_extra(Value::String(out)));
                }
            }
        }
        "macos" => {
            if let Some(out) = ctx.run("pmset", &["-g", "batt"], 1)? {
                log.push(AuditRecord::new("power", "battery", "pmset batt", "ok").with_extra(Value::String(out)));
            }
        }
        _ => {
            let battery = ctx
                .run("upower", &["-e"], 1)?
                .and_then(|out| out.lines().find(|l| l.contains("BAT")).map(str::to_string));
            if let Some(device) = battery {
                if let Some(out) = ctx.run("upower", &["-i", device.as_str()], 1)? {
                    log.push(AuditRecord::new("power", "battery", "upower", "ok").with_extra(Value::String(out)));
                }
            }
        }
    }
    Ok(())
}

fn powershell(script: &str) -> [&str; 5] {
    ["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script]
}

const DISPLAY_CLASSES: [&str; 3] = ["vga compatible controller", "3d controller", "display controller"];

/// Display controllers from `lspci` output
///
/// Only the device class (between the slot and the first colon) is matched,
/// so vendor and device names cannot trigger a false hit.
fn pci_display_devices(lspci: &str) -> Vec<String> {
    lspci
        .lines()
        .filter(|line| {
            let class = line
                .trim()
                .split_once(' ')
                .and_then(|(_, rest)| rest.split_once(':'))
                .map(|(class, _)| class.trim().to_lowercase())
                .unwrap_or_default();
            DISPLAY_CLASSES.contains(&class.as_str())
        })
        .map(|line| line.trim().to_string())
        .collect()
}

/// `nvidia-smi --query-gpu=name,memory.total,driver_version` rows
fn parse_nvidia_gpus(output: &str) -> Vec<AuditRecord> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .filter_map(|(i, line)| {
            let cols: Vec<&str> = line.split(',').map(str::trim).collect();
            match cols.as_slice() {
                [name, mem, driver, ..] => Some(
                    AuditRecord::new("gpu", format!("nvidia_{}", i), *name, mem)
                        .with_extra(json!({ "driver": driver })),
                ),
                _ => None,
            }
        })
        .collect()
}

/// `wmic ... /format:csv` rows: Node,AdapterRAM,DriverDate,DriverVersion,Name
fn parse_wmic_gpus(output: &str) -> Vec<AuditRecord> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .skip(1)
        .enumerate()
        .filter_map(|(i, line)| {
            let cols: Vec<&str> = line.split(',').map(str::trim).collect();
            match cols.as_slice() {
                [_, ram, date, version, name, ..] => Some(
                    AuditRecord::new("gpu", format!("gpu_{}", i), *name, ram)
                        .with_unit("bytes")
                        .with_extra(json!({ "driver": version, "date": date })),
                ),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_display_devices() {
        let out = "00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 630\n\
                   00:14.0 USB controller: Intel Corporation Device a36d\n\
                   01:00.0 3D controller: NVIDIA Corporation GA102 [GeForce RTX 3090]";
        let gpus = pci_display_devices(out);
        assert_eq!(gpus.len(), 2);
        assert!(gpus[1].contains("GA102"));
    }

    #[test]
    fn test_pci_display_devices_matches_class_only() {
        let out = "00:1f.3 Audio device: Intel Corporation Device 3d2f\n\
                   00:16.0 Communication controller: VGA Systems Device 1234\n\
                   02:00.0 Display controller: Advanced Micro Devices, Inc. [AMD/ATI] Device 164e";
        let gpus = pci_display_devices(out);
        assert_eq!(gpus.len(), 1);
        assert!(gpus[0].starts_with("02:00.0 Display controller"));
    }

    #[test]
    fn test_parse_nvidia_gpus() {
        let out = "NVIDIA GeForce RTX 4090, 24564 MiB, 550.54.14\nbroken line\n";
        let rows = parse_nvidia_gpus(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "nvidia_0");
        assert_eq!(rows[0].name, "NVIDIA GeForce RTX 4090");
        assert_eq!(rows[0].value, "24564 MiB");
        assert_eq!(rows[0].extra, r#"{"driver":"550.54.14"}"#);
    }

    #[test]
    fn test_parse_wmic_gpus() {
        let out = "\r\nNode,AdapterRAM,DriverDate,DriverVersion,Name\r\n\
                   DESKTOP,4293918720,20240101000000.000000-000,31.0.15.5176,NVIDIA GeForce RTX 3060\r\n";
        let rows = parse_wmic_gpus(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "NVIDIA GeForce RTX 3060");
        assert_eq!(rows[0].value, "4293918720");
        assert_eq!(rows[0].unit, "bytes");
        let extra: Value = serde_json::from_str(&rows[0].extra).unwrap();
        assert_eq!(extra["driver"], "31.0.15.5176");
    }
}
