//! PID liveness checks.
//!
//! The supervisor does not hold parent-child relationships across
//! invocations; after launch a service is tracked purely through its pid
//! file, so "is this pid a live, non-zombie process" is the one question
//! everything else hangs on.

use std::fs;

use chrono::{DateTime, Local};
use libc::pid_t;
use nix::{errno::Errno, sys::signal::kill, unistd::Pid};

/// Returns true when `pid` refers to an existing, non-zombie process.
///
/// A process we lack permission to signal still exists, so `EPERM` counts
/// as alive. When `/proc/<pid>/status` is readable, a `Z` state demotes the
/// process to dead.
pub fn pid_alive(pid: pid_t) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => {}
        Err(Errno::EPERM) => return true,
        Err(_) => return false,
    }
    !is_zombie(pid)
}

fn is_zombie(pid: pid_t) -> bool {
    let Ok(status) = fs::read_to_string(format!("/proc/{pid}/status")) else {
        return false;
    };
    status
        .lines()
        .find(|line| line.starts_with("State:"))
        .is_some_and(|line| line.contains('Z'))
}

/// Approximate start time of a process, derived from the mtime of its
/// `/proc` entry. Returns `None` when the process is gone or `/proc` is
/// unavailable.
pub fn proc_start_time(pid: pid_t) -> Option<DateTime<Local>> {
    let metadata = fs::metadata(format!("/proc/{pid}")).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Local>::from(modified))
}
