#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use serviced::{
    config::SupervisorConfig, state::StateStore, supervisor::Supervisor,
};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tempfile::TempDir;

/// A fully sandboxed supervisor environment: its own unit directory, state
/// root, and persistent root under one temp dir.
pub struct Sandbox {
    temp: TempDir,
    pub config: SupervisorConfig,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create sandbox tempdir");
        let units_dir = temp.path().join("units");
        fs::create_dir_all(&units_dir).expect("create units dir");

        let mut config = SupervisorConfig::default().with_sandbox(temp.path());
        config.unit_paths = vec![units_dir];

        Self { temp, config }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn units_dir(&self) -> PathBuf {
        self.config.unit_paths[0].clone()
    }

    /// Adds a second, lower-priority unit directory.
    pub fn add_unit_dir(&mut self, name: &str) -> PathBuf {
        let dir = self.temp.path().join(name);
        fs::create_dir_all(&dir).expect("create extra unit dir");
        self.config.unit_paths.push(dir.clone());
        dir
    }

    pub fn write_unit(&self, name: &str, body: &str) -> PathBuf {
        let path = self.units_dir().join(name);
        fs::write(&path, body).expect("write unit file");
        path
    }

    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.config.clone())
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(&self.config)
    }
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}

pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !serviced::process::pid_alive(pid as libc::pid_t) {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for PID {} to exit", pid);
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}
