//! External command helpers
//!
//! Probes shell out to OS utilities (`nvidia-smi`, `lsblk`,
//! `system_profiler`, ...). Commands are looked up on `PATH` first and
//! run with a deadline.

use crate::error::{BenchError, Result};
use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default deadline for probe commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (None if killed by a signal)
    pub code: Option<i32>,
    /// Trimmed standard output
    pub stdout: String,
    /// Trimmed standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Locate an executable on PATH
pub fn which(cmd: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            let full_path = dir.join(cmd);
            if full_path.is_file() {
                return Some(full_path);
            }
            #[cfg(windows)]
            {
                let exe = dir.join(format!("{}.exe", cmd));
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    })
}

/// Run a command to completion or until `timeout` elapses
///
/// A timeout too large to represent as an instant means no deadline.
pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BenchError::command(cmd, e.to_string()))?;

    // Drain pipes on separate threads so large outputs cannot block the child
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BenchError::command(
                    cmd,
                    format!("timed out after {}", humantime::format_duration(timeout)),
                ));
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(e) => return Err(BenchError::command(cmd, e.to_string())),
        }
    };

    let join = |handle: Option<thread::JoinHandle<String>>| {
        handle
            .and_then(|h| h.join().ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Ok(CommandOutput {
        code: status.code(),
        stdout: join(stdout),
        stderr: join(stderr),
    })
}

/// Run a command and return stdout only if it exited successfully
pub fn command_stdout(cmd: &str, args: &[&str], timeout: Duration) -> Option<String> {
    match run_command(cmd, args, timeout) {
        Ok(out) if out.success() => Some(out.stdout),
        Ok(out) => {
            tracing::debug!("{} exited with {:?}: {}", cmd, out.code, out.stderr);
            None
        }
        Err(e) => {
            tracing::debug!("{}", e);
            None
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_is_error() {
        let err = run_command("wsbench-definitely-not-a-command", &[], DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, BenchError::CommandFailed { .. }));
        assert!(which("wsbench-definitely-not-a-command").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_status() {
        let out = run_command("sh", &["-c", "echo hello; echo oops 1>&2; exit 3"], DEFAULT_TIMEOUT).unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let err = run_command("sh", &["-c", "exec sleep 5"], Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_unrepresentable_timeout_runs_without_deadline() {
        let out = run_command("sh", &["-c", "echo done"], Duration::from_secs(u64::MAX)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "done");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_stdout_filters_failures() {
        assert_eq!(command_stdout("sh", &["-c", "echo ok"], DEFAULT_TIMEOUT).as_deref(), Some("ok"));
        assert!(command_stdout("sh", &["-c", "exit 1"], DEFAULT_TIMEOUT).is_none());
        assert!(which("sh").is_some());
    }
}
