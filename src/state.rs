//! # Persistent Service State
//!
//! Everything the supervisor knows about a service between invocations lives
//! on disk: a pid file, an append-only log, a JSON status record, an enabled
//! marker, and a best-effort audit log of start/stop requests.

use std::{
    fs::{self, DirBuilder, OpenOptions},
    io::Write,
    os::unix::fs::{DirBuilderExt, symlink},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use libc::pid_t;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::debug;

use crate::{
    config::SupervisorConfig,
    constants::STATE_DIR_MODE,
    error::StateStoreError,
};

/// Activity state persisted in a status record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    /// The service is (or is considered) running.
    Active,
    /// The service is stopped or completed without `RemainAfterExit`.
    Inactive,
    /// The last lifecycle operation failed.
    Failed,
}

/// The most recent persisted status of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Activity state at the time of the last write.
    pub state: UnitState,
    /// Tracked main pid; 0 when unknown or not applicable.
    #[serde(default)]
    pub pid: u32,
    /// Human-readable detail for `status` output.
    #[serde(default)]
    pub message: String,
    /// Local time of the last write.
    pub timestamp: DateTime<Local>,
}

/// Filesystem layout for per-service runtime and persistent state.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
    pid_dir: PathBuf,
    log_dir: PathBuf,
    status_dir: PathBuf,
    enabled_dir: PathBuf,
    action_log: PathBuf,
}

impl StateStore {
    /// Builds the store from the supervisor configuration.
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            state_dir: config.state_dir.clone(),
            pid_dir: config.pid_dir(),
            log_dir: config.log_dir(),
            status_dir: config.status_dir(),
            enabled_dir: config.enabled_dir(),
            action_log: config.action_log_path(),
        }
    }

    /// Creates the state directories with mode 0755.
    ///
    /// Failures under the state root propagate (a start cannot proceed
    /// without somewhere to track the pid); the persistent root is
    /// best-effort since enable/boot may legitimately lack privileges.
    pub fn ensure_dirs(&self) -> Result<(), StateStoreError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true).mode(STATE_DIR_MODE);
        for dir in [&self.state_dir, &self.pid_dir, &self.log_dir, &self.status_dir] {
            builder.create(dir)?;
        }
        if let Err(err) = builder.create(&self.enabled_dir) {
            debug!(
                "Could not create {}: {err}",
                self.enabled_dir.display()
            );
        }
        Ok(())
    }

    /// Path of the pid file for a service.
    pub fn pid_path(&self, name: &str) -> PathBuf {
        self.pid_dir.join(format!("{name}.pid"))
    }

    /// Path of the log file for a service.
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{name}.log"))
    }

    /// Path of the status record for a service.
    pub fn status_path(&self, name: &str) -> PathBuf {
        self.status_dir.join(format!("{name}.json"))
    }

    /// Path of the enabled marker for a service.
    pub fn enabled_path(&self, name: &str) -> PathBuf {
        self.enabled_dir.join(name)
    }

    /// Directory of enabled markers.
    pub fn enabled_dir(&self) -> &Path {
        &self.enabled_dir
    }

    /// Reads the tracked pid for a service. Absent or unparsable means the
    /// service is not running as far as the supervisor knows.
    pub fn read_pid(&self, name: &str) -> Option<pid_t> {
        let content = fs::read_to_string(self.pid_path(name)).ok()?;
        content.trim().parse().ok()
    }

    /// Records the tracked pid for a service.
    pub fn write_pid(&self, name: &str, pid: pid_t) -> Result<(), StateStoreError> {
        self.ensure_dirs()?;
        fs::write(self.pid_path(name), pid.to_string())?;
        Ok(())
    }

    /// Removes the pid file; missing is fine.
    pub fn remove_pid(&self, name: &str) {
        let _ = fs::remove_file(self.pid_path(name));
    }

    /// Overwrites the status record for a service.
    pub fn write_status(
        &self,
        name: &str,
        state: UnitState,
        pid: u32,
        message: &str,
    ) -> Result<(), StateStoreError> {
        self.ensure_dirs()?;
        let record = StatusRecord {
            state,
            pid,
            message: message.to_string(),
            timestamp: Local::now(),
        };
        fs::write(self.status_path(name), serde_json::to_vec(&record)?)?;
        Ok(())
    }

    /// Reads the status record for a service, tolerating absence and
    /// partial writes.
    pub fn read_status(&self, name: &str) -> Option<StatusRecord> {
        let content = fs::read_to_string(self.status_path(name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Appends the start banner to a service's log.
    pub fn append_start_banner(&self, name: &str) -> Result<(), StateStoreError> {
        self.ensure_dirs()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(name))?;
        writeln!(
            file,
            "\n--- {} START {name} ---",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        Ok(())
    }

    /// Reads the last `lines` lines of a service's log, or `None` when no
    /// log exists yet.
    pub fn read_log_tail(&self, name: &str, lines: usize) -> Option<Vec<String>> {
        let content = fs::read_to_string(self.log_path(name)).ok()?;
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Some(all[start..].iter().map(|line| line.to_string()).collect())
    }

    /// Appends one audit line per start/stop request. All I/O errors are
    /// swallowed: losing an audit line must never fail the operation.
    pub fn log_action(&self, message: &str) {
        let entry = format!(
            "[{}] {message}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.action_log.parent() {
                let mut builder = DirBuilder::new();
                builder.recursive(true).mode(STATE_DIR_MODE);
                builder.create(parent)?;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.action_log)?
                .write_all(entry.as_bytes())
        };
        if let Err(err) = write() {
            debug!("Audit log write failed: {err}");
        }
    }

    /// Whether the enabled marker exists for a service.
    pub fn is_enabled(&self, name: &str) -> bool {
        let path = self.enabled_path(name);
        path.exists() || path.symlink_metadata().is_ok()
    }

    /// Creates the enabled marker, preferably as a symlink to the unit file.
    ///
    /// Returns `Ok(false)` when the marker already existed. When symlink
    /// creation is refused for a reason other than permissions, a plain
    /// marker file is written instead.
    pub fn enable(
        &self,
        name: &str,
        unit_path: Option<&Path>,
    ) -> Result<bool, StateStoreError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true).mode(STATE_DIR_MODE);
        builder.create(&self.enabled_dir).map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                StateStoreError::EnablePermission(name.to_string())
            } else {
                StateStoreError::Io(err)
            }
        })?;

        let target = self.enabled_path(name);
        if self.is_enabled(name) {
            return Ok(false);
        }

        if let Some(unit_path) = unit_path {
            match symlink(unit_path, &target) {
                Ok(()) => return Ok(true),
                Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                    return Err(StateStoreError::EnablePermission(name.to_string()));
                }
                Err(err) => {
                    debug!(
                        "Symlink for {name} refused ({err}); writing marker file"
                    );
                }
            }
        }

        fs::write(&target, "# enabled\n").map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                StateStoreError::EnablePermission(name.to_string())
            } else {
                StateStoreError::Io(err)
            }
        })?;
        Ok(true)
    }

    /// Removes the enabled marker; already-absent counts as success.
    pub fn disable(&self, name: &str) -> Result<bool, StateStoreError> {
        let target = self.enabled_path(name);
        if target.symlink_metadata().is_err() {
            return Ok(false);
        }
        fs::remove_file(&target).map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                StateStoreError::EnablePermission(name.to_string())
            } else {
                StateStoreError::Io(err)
            }
        })?;
        Ok(true)
    }
}
