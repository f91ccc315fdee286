//! Process launching for service commands.
//!
//! Two modes: foreground (`ExecStartPre`, oneshot and forking starts) with a
//! hard wall timeout, and background (the main process of simple services)
//! with stdout/stderr appended to the service log. In both modes the child
//! enters a new session so that it survives the supervisor and is reparented
//! to pid 1; `User=`/`Group=` switches happen in the pre-exec hook.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::Instant,
};

use nix::unistd::{Gid, Group, Uid, User, setgid, setsid, setuid};
use tracing::{debug, error, info, warn};

use crate::{
    command::ExecCommand,
    constants::{DRY_RUN_PID, FOREGROUND_POLL_INTERVAL, FOREGROUND_TIMEOUT},
};

/// Everything beyond argv that a launch needs.
#[derive(Debug)]
pub struct ExecContext<'a> {
    /// Fully resolved environment for the child.
    pub env: &'a HashMap<String, String>,
    /// `WorkingDirectory=`; ignored unless it is an existing directory.
    pub cwd: Option<&'a str>,
    /// `User=` to switch to, resolved best-effort.
    pub user: Option<&'a str>,
    /// `Group=` to switch to, resolved best-effort.
    pub group: Option<&'a str>,
    /// Service log; stderr of failed foreground steps and all background
    /// output are appended here.
    pub log_path: Option<&'a Path>,
}

/// Spawns service processes, honoring dry-run mode.
#[derive(Debug, Clone, Copy)]
pub struct Launcher {
    /// When set, nothing is spawned; synthetic results are returned.
    pub dry_run: bool,
}

impl Launcher {
    /// Runs a command synchronously and returns its exit code.
    ///
    /// Spawn failures map onto shell-style codes: 127 for a missing
    /// program, 126 for a permission error, 1 otherwise. A child that is
    /// still running after the wall timeout is killed and reported as 1.
    pub fn run_foreground(&self, cmd: &ExecCommand, ctx: &ExecContext) -> i32 {
        let Some(program) = cmd.program() else {
            return 0;
        };
        debug!("Running: {}", cmd.argv.join(" "));

        if self.dry_run {
            info!("[DRY RUN] Would execute: {}", cmd.argv.join(" "));
            return 0;
        }

        let mut command = Command::new(program);
        command
            .args(&cmd.argv[1..])
            .env_clear()
            .envs(ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        apply_launch_context(&mut command, ctx);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return spawn_error_code(program, &err),
        };

        // Drain stderr on a side thread so a chatty child can never block
        // on a full pipe while we poll for its exit.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });

        let deadline = Instant::now() + FOREGROUND_TIMEOUT;
        let code = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status.code().unwrap_or(1),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("{program} exceeded the foreground timeout; killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        break 1;
                    }
                    thread::sleep(FOREGROUND_POLL_INTERVAL);
                }
                Err(err) => {
                    error!("Failed to wait for {program}: {err}");
                    break 1;
                }
            }
        };

        let stderr_output = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if code != 0 {
            let trimmed = stderr_output.trim();
            if !trimmed.is_empty() {
                debug!("stderr: {trimmed}");
                if let Some(log_path) = ctx.log_path {
                    append_to_log(log_path, trimmed);
                }
            }
        }

        code
    }

    /// Launches a command in the background and returns its pid.
    ///
    /// stdout and stderr are appended to the service log (or discarded when
    /// no log path is given), stdin is detached. Spawn failures are logged
    /// and reported as `None`.
    pub fn spawn_background(&self, cmd: &ExecCommand, ctx: &ExecContext) -> Option<u32> {
        let program = cmd.program()?;
        debug!("Running: {}", cmd.argv.join(" "));

        if self.dry_run {
            info!("[DRY RUN] Would execute: {}", cmd.argv.join(" "));
            return Some(DRY_RUN_PID);
        }

        let sink = match open_log_sink(ctx.log_path) {
            Ok(sink) => sink,
            Err(err) => {
                error!("Failed to open log sink for {program}: {err}");
                return None;
            }
        };
        let stderr_sink = match sink.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                error!("Failed to clone log sink for {program}: {err}");
                return None;
            }
        };

        let mut command = Command::new(program);
        command
            .args(&cmd.argv[1..])
            .env_clear()
            .envs(ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::from(stderr_sink));
        apply_launch_context(&mut command, ctx);

        match command.spawn() {
            Ok(child) => Some(child.id()),
            Err(err) => {
                spawn_error_code(program, &err);
                None
            }
        }
    }
}

/// Applies cwd, session detach, and uid/gid switching to a command.
fn apply_launch_context(command: &mut Command, ctx: &ExecContext) {
    if let Some(cwd) = ctx.cwd {
        let dir = PathBuf::from(cwd);
        if dir.is_dir() {
            command.current_dir(dir);
        } else {
            debug!("WorkingDirectory {cwd} does not exist; ignoring");
        }
    }

    let (uid, gid) = resolve_account(ctx.user, ctx.group);
    unsafe {
        command.pre_exec(move || {
            let _ = setsid();
            if let Some(gid) = gid {
                let _ = setgid(gid);
            }
            if let Some(uid) = uid {
                let _ = setuid(uid);
            }
            Ok(())
        });
    }
}

/// Resolves `User=`/`Group=` names into raw ids before the fork.
///
/// A user implies their primary gid unless an explicit group overrides it.
/// Unresolved names only warn; the privilege drop is skipped.
fn resolve_account(user: Option<&str>, group: Option<&str>) -> (Option<Uid>, Option<Gid>) {
    let mut uid = None;
    let mut gid = None;

    if let Some(name) = user {
        match User::from_name(name) {
            Ok(Some(account)) => {
                uid = Some(account.uid);
                gid = Some(account.gid);
            }
            _ => warn!("User '{name}' not found, running as current user"),
        }
    }
    if let Some(name) = group {
        match Group::from_name(name) {
            Ok(Some(account)) => gid = Some(account.gid),
            _ => warn!("Group '{name}' not found"),
        }
    }

    (uid, gid)
}

fn spawn_error_code(program: &str, err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => {
            error!("Command not found: {program}");
            127
        }
        io::ErrorKind::PermissionDenied => {
            error!("Permission denied: {program}");
            126
        }
        _ => {
            error!("Failed to execute {program}: {err}");
            1
        }
    }
}

fn open_log_sink(log_path: Option<&Path>) -> io::Result<File> {
    match log_path {
        Some(path) => OpenOptions::new().create(true).append(true).open(path),
        None => OpenOptions::new().write(true).open("/dev/null"),
    }
}

fn append_to_log(log_path: &Path, content: &str) {
    let appended = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .and_then(|mut file| writeln!(file, "{content}"));
    if let Err(err) = appended {
        debug!("Failed to append stderr to {}: {err}", log_path.display());
    }
}
