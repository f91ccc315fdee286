//! # Service Supervisor
//!
//! Orchestrates the unit registry, environment and command resolution, the
//! launcher, and the state store into the user-visible operations: start,
//! stop, restart, enable, disable, status, log, list, and the boot-style
//! start of all enabled services.
//!
//! The supervisor is a single-threaded, per-invocation value: it owns its
//! configuration explicitly, caches parsed units for the lifetime of one
//! command, and tracks nothing in memory across invocations. Child
//! processes survive it by entering a new session at launch and are found
//! again through their pid files.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
    process::{Command, Stdio},
    thread,
};

use libc::pid_t;
use tracing::{debug, error, info, warn};

use crate::{
    command::{resolve_command, tokenize},
    config::SupervisorConfig,
    constants::{
        KILL_GRACE, NOTIFY_SETTLE, PIDFILE_POLL_ATTEMPTS, PIDFILE_POLL_INTERVAL,
        PRECLEAN_GRACE, PROTECTED_PIDS, RESTART_DELAY, SIMPLE_SETTLE,
        STOP_POLL_ATTEMPTS, STOP_POLL_INTERVAL,
    },
    environment::build_environment,
    error::ServicedError,
    process::{pid_alive, proc_start_time},
    registry::{UnitRegistry, canonical_name},
    spawn::{ExecContext, Launcher},
    state::{StateStore, UnitState},
    unit::{ServiceKind, UnitFile},
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Owns one invocation's view of the world.
pub struct Supervisor {
    config: SupervisorConfig,
    registry: UnitRegistry,
    store: StateStore,
    launcher: Launcher,
}

impl Supervisor {
    /// Creates a supervisor from an explicit configuration.
    pub fn new(config: SupervisorConfig) -> Self {
        let registry = UnitRegistry::new(config.unit_paths.clone());
        let store = StateStore::new(&config);
        let launcher = Launcher {
            dry_run: config.dry_run,
        };
        Self {
            config,
            registry,
            store,
            launcher,
        }
    }

    /// Read access to the state store (used by the status/list output).
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Starts a service, its dependencies first.
    pub fn start(&mut self, name: &str) -> Result<(), ServicedError> {
        let name = canonical_name(name);
        self.start_internal(&name, true)
    }

    fn start_internal(
        &mut self,
        name: &str,
        with_deps: bool,
    ) -> Result<(), ServicedError> {
        self.store.log_action(&format!("START request for {name}"));
        self.gate(name)?;

        let unit = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| ServicedError::NotFound(name.to_string()))?;

        let service_type = unit.service_type();
        if self.config.is_unsupported_type(&service_type) {
            return Err(ServicedError::UnsupportedType {
                service: name.to_string(),
                kind: service_type,
            });
        }

        self.clean_stale(name, &unit);

        if let Some(condition) = unit.condition_path_exists() {
            let (negate, path) = match condition.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, condition),
            };
            let exists = Path::new(path.trim_start_matches('!')).exists();
            if negate == exists {
                warn!("ConditionPathExists failed for {name}: {condition}");
                return Err(ServicedError::ConditionFailed {
                    service: name.to_string(),
                    condition: condition.to_string(),
                });
            }
        }

        if with_deps {
            self.start_dependencies(name, &unit);
        }

        if !self.config.quiet {
            info!("Starting {name} ({})...", unit.description());
        }

        let env = build_environment(&unit);
        if !self.config.dry_run {
            self.store.ensure_dirs()?;
            self.store.append_start_banner(name)?;
        }

        for raw in unit.exec_start_pre() {
            let cmd = resolve_command(&raw, &env);
            let code = self
                .launcher
                .run_foreground(&cmd, &self.exec_context(&unit, &env, None));
            if code != 0 && cmd.check_errors {
                error!("ExecStartPre failed for {name} (exit {code})");
                self.record_status(name, UnitState::Failed, 0, "ExecStartPre failed")?;
                return Err(ServicedError::ExecStepFailure {
                    service: name.to_string(),
                    phase: "ExecStartPre",
                    code,
                });
            }
        }

        match unit.kind() {
            ServiceKind::Oneshot => self.start_oneshot(name, &unit, env),
            ServiceKind::Forking => self.start_forking(name, &unit, env),
            _ => self.start_simple(name, &unit, env),
        }
    }

    /// Launches the last `ExecStart` in the background and confirms it
    /// survives the settle window.
    fn start_simple(
        &mut self,
        name: &str,
        unit: &UnitFile,
        mut env: HashMap<String, String>,
    ) -> Result<(), ServicedError> {
        let commands = unit.exec_start();
        let Some(raw) = commands.last() else {
            self.record_status(name, UnitState::Failed, 0, "No ExecStart")?;
            return Err(ServicedError::MissingExecStart(name.to_string()));
        };

        env.insert("MAINPID".to_string(), String::new());
        let cmd = resolve_command(raw, &env);
        let log_path = self.store.log_path(name);
        let pid = self.launcher.spawn_background(
            &cmd,
            &self.exec_context(unit, &env, Some(&log_path)),
        );

        let Some(pid) = pid else {
            error!("Failed to start {name}");
            self.record_status(name, UnitState::Failed, 0, "Failed to start process")?;
            return Err(ServicedError::SpawnFailure(name.to_string()));
        };

        if !self.config.dry_run {
            self.store.write_pid(name, pid as pid_t)?;
            self.record_status(name, UnitState::Active, pid, "")?;
        }
        env.insert("MAINPID".to_string(), pid.to_string());

        if !self.config.dry_run {
            let settle = match unit.kind() {
                ServiceKind::Notify | ServiceKind::NotifyReload => NOTIFY_SETTLE,
                _ => SIMPLE_SETTLE,
            };
            thread::sleep(settle);

            if !pid_alive(pid as pid_t) {
                if unit.remain_after_exit() {
                    if !self.config.quiet {
                        info!("{name} started and exited (RemainAfterExit=yes)");
                    }
                    self.record_status(
                        name,
                        UnitState::Active,
                        0,
                        "Exited (RemainAfterExit)",
                    )?;
                } else {
                    error!("{name} started but exited immediately");
                    self.record_status(
                        name,
                        UnitState::Failed,
                        0,
                        "Exited immediately",
                    )?;
                    self.store.remove_pid(name);
                    return Err(ServicedError::DeadOnArrival(name.to_string()));
                }
            }
        }

        if !self.config.quiet {
            info!("{name} started (PID {pid})");
        }
        self.run_post_commands(name, unit, &env);
        Ok(())
    }

    /// Runs every `ExecStart` to completion and recovers the daemon pid
    /// from `PIDFile=` when one is declared.
    fn start_forking(
        &mut self,
        name: &str,
        unit: &UnitFile,
        env: HashMap<String, String>,
    ) -> Result<(), ServicedError> {
        let commands = unit.exec_start();
        if commands.is_empty() {
            return Err(ServicedError::MissingExecStart(name.to_string()));
        }

        let log_path = self.store.log_path(name);
        for raw in &commands {
            let cmd = resolve_command(raw, &env);
            let code = self.launcher.run_foreground(
                &cmd,
                &self.exec_context(unit, &env, Some(&log_path)),
            );
            if code != 0 && cmd.check_errors {
                error!("ExecStart failed for {name} (exit {code})");
                self.record_status(name, UnitState::Failed, 0, "ExecStart failed")?;
                return Err(ServicedError::ExecStepFailure {
                    service: name.to_string(),
                    phase: "ExecStart",
                    code,
                });
            }
        }

        let mut pid: pid_t = 0;
        if let Some(pid_file) = unit.pid_file() {
            for _ in 0..PIDFILE_POLL_ATTEMPTS {
                if let Ok(content) = fs::read_to_string(pid_file)
                    && let Ok(parsed) = content.trim().parse::<pid_t>()
                {
                    pid = parsed;
                    break;
                }
                if self.config.dry_run {
                    break;
                }
                thread::sleep(PIDFILE_POLL_INTERVAL);
            }
        }

        if pid > 0 && pid_alive(pid) {
            if !self.config.dry_run {
                self.store.write_pid(name, pid)?;
                self.record_status(name, UnitState::Active, pid as u32, "")?;
            }
            if !self.config.quiet {
                info!("{name} started (PID {pid} from PIDFile)");
            }
        } else {
            warn!("{name}: forking service started but no PID tracked");
            self.record_status(name, UnitState::Active, 0, "PID unknown")?;
        }

        self.run_post_commands(name, unit, &env);
        Ok(())
    }

    /// Runs every `ExecStart` to completion; the service is done when the
    /// commands are.
    fn start_oneshot(
        &mut self,
        name: &str,
        unit: &UnitFile,
        env: HashMap<String, String>,
    ) -> Result<(), ServicedError> {
        let commands = unit.exec_start();
        if commands.is_empty() {
            return Err(ServicedError::MissingExecStart(name.to_string()));
        }

        let log_path = self.store.log_path(name);
        for raw in &commands {
            let cmd = resolve_command(raw, &env);
            let code = self.launcher.run_foreground(
                &cmd,
                &self.exec_context(unit, &env, Some(&log_path)),
            );
            if code != 0 && cmd.check_errors {
                error!("ExecStart failed for {name} (exit {code})");
                self.record_status(
                    name,
                    UnitState::Failed,
                    0,
                    &format!("ExecStart failed (exit {code})"),
                )?;
                return Err(ServicedError::ExecStepFailure {
                    service: name.to_string(),
                    phase: "ExecStart",
                    code,
                });
            }
        }

        if unit.remain_after_exit() {
            self.record_status(
                name,
                UnitState::Active,
                0,
                "Completed (RemainAfterExit)",
            )?;
        } else {
            self.record_status(
                name,
                UnitState::Inactive,
                0,
                "Completed successfully",
            )?;
        }
        if !self.config.quiet {
            info!("{name} completed");
        }

        self.run_post_commands(name, unit, &env);
        Ok(())
    }

    /// Stops a service by signalling its tracked pid.
    ///
    /// Already-stopped services succeed idempotently and leave an
    /// `inactive` status behind.
    pub fn stop(&mut self, name: &str) -> Result<(), ServicedError> {
        let name = canonical_name(name);
        self.store.log_action(&format!("STOP request for {name}"));
        self.gate(&name)?;

        if self.registry.get(&name).is_none() {
            return Err(ServicedError::NotFound(name));
        }

        let pid = self.store.read_pid(&name).unwrap_or(0);
        if pid == 0 || !pid_alive(pid) {
            if !self.config.quiet {
                info!("{name} is not running");
            }
            self.store.remove_pid(&name);
            self.record_status(&name, UnitState::Inactive, 0, "")?;
            return Ok(());
        }

        if PROTECTED_PIDS.contains(&pid) {
            return Err(ServicedError::ProtectedPid(pid));
        }

        if !self.config.quiet {
            info!("Stopping {name} (PID {pid})...");
        }
        if self.config.dry_run {
            info!("[DRY RUN] Would stop PID {pid}");
            return Ok(());
        }

        match signal(pid, nix::sys::signal::Signal::SIGTERM) {
            Ok(()) => debug!("Sent SIGTERM to PID {pid}"),
            Err(nix::errno::Errno::ESRCH) => {}
            Err(nix::errno::Errno::EPERM) => {
                error!("Permission denied killing PID {pid}");
                return Err(ServicedError::SignalPermission(pid));
            }
            Err(err) => debug!("SIGTERM to {pid} failed: {err}"),
        }

        for _ in 0..STOP_POLL_ATTEMPTS {
            if !pid_alive(pid) {
                break;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }

        if pid_alive(pid) {
            let _ = signal(pid, nix::sys::signal::Signal::SIGKILL);
            warn!("Sent SIGKILL to PID {pid}");
            thread::sleep(KILL_GRACE);
        }

        if pid_alive(pid) {
            error!("Failed to stop {name} (PID {pid} still alive)");
            self.record_status(&name, UnitState::Failed, pid as u32, "Could not kill")?;
            return Err(ServicedError::StopStuck { service: name, pid });
        }

        self.store.remove_pid(&name);
        self.record_status(&name, UnitState::Inactive, 0, "")?;
        if !self.config.quiet {
            info!("{name} stopped");
        }
        Ok(())
    }

    /// Stop, pause, start. The start result is the restart result.
    pub fn restart(&mut self, name: &str) -> Result<(), ServicedError> {
        let name = canonical_name(name);
        if let Err(err) = self.stop(&name) {
            warn!("Stop before restart of {name} failed: {err}");
        }
        thread::sleep(RESTART_DELAY);
        self.start(&name)
    }

    /// Marks a service for start-on-boot.
    pub fn enable(&mut self, name: &str) -> Result<(), ServicedError> {
        let name = canonical_name(name);
        let unit_path = self
            .registry
            .get(&name)
            .ok_or_else(|| ServicedError::NotFound(name.clone()))?
            .path
            .clone();

        if self.store.enable(&name, unit_path.as_deref())? {
            info!("Enabled {name}");
        } else {
            info!("{name} is already enabled");
        }
        Ok(())
    }

    /// Removes the start-on-boot marker; already-absent counts as success.
    pub fn disable(&mut self, name: &str) -> Result<(), ServicedError> {
        let name = canonical_name(name);
        if self.store.disable(&name)? {
            info!("Disabled {name}");
        } else {
            info!("{name} is not enabled");
        }
        Ok(())
    }

    /// Whether the enabled marker exists.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.store.is_enabled(&canonical_name(name))
    }

    /// Starts every enabled service in lexicographic order, printing one
    /// boot-style line per service. Services start in quiet mode so the
    /// OK/FAILED transcript is not interleaved with per-service chatter.
    pub fn start_all_enabled(&mut self) {
        let enabled_dir = self.store.enabled_dir().to_path_buf();
        if !enabled_dir.is_dir() {
            println!("No enabled services found.");
            return;
        }

        let mut names: Vec<String> = fs::read_dir(&enabled_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| entry.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();

        if names.is_empty() {
            println!("No enabled services.");
            return;
        }

        println!("Starting enabled services...");

        let previous_quiet = self.config.quiet;
        self.config.quiet = true;
        for name in names {
            if !name.ends_with(".service") {
                continue;
            }
            let description = self
                .registry
                .get(&name)
                .map(UnitFile::description)
                .unwrap_or_else(|| name.clone());

            match self.start(&name) {
                Ok(()) => {
                    println!("[{GREEN}  OK  {RESET}] Started {description}.");
                }
                Err(err) => {
                    error!("{err}");
                    println!("[{RED}FAILED{RESET}] Failed to start {description}.");
                }
            }
        }
        self.config.quiet = previous_quiet;
    }

    /// Prints a status block for a service and returns its exit code:
    /// 0 active, 3 inactive or failed, 4 not found.
    pub fn status(&mut self, name: &str) -> i32 {
        let name = canonical_name(name);
        let Some(unit) = self.registry.get(&name) else {
            println!("{name} - not found");
            return 4;
        };
        let description = unit.description();
        let loaded_from = unit
            .path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        println!("\u{25cf} {name} - {description}");
        println!("   Loaded: loaded ({loaded_from})");

        let pid = self.store.read_pid(&name).unwrap_or(0);
        if pid > 0 && pid_alive(pid) {
            println!("   Active: {GREEN}active (running){RESET}");
            println!("      PID: {pid}");
            if let Some(started) = proc_start_time(pid) {
                let uptime = chrono::Local::now().signed_duration_since(started);
                println!(
                    "    Since: {} ({} ago)",
                    started.format("%Y-%m-%d %H:%M:%S"),
                    format_uptime(uptime)
                );
            }
            return 0;
        }

        if let Some(record) = self.store.read_status(&name) {
            match record.state {
                UnitState::Active => {
                    println!("   Active: {GREEN}active{RESET}");
                }
                UnitState::Failed => {
                    println!("   Active: {RED}failed{RESET}");
                }
                UnitState::Inactive => println!("   Active: inactive"),
            }
            if !record.message.is_empty() {
                println!("   Status: {}", record.message);
            }
            println!("    Since: {}", record.timestamp.format("%Y-%m-%dT%H:%M:%S"));
            return if record.state == UnitState::Active { 0 } else { 3 };
        }

        println!("   Active: inactive (dead)");
        3
    }

    /// Prints the last `lines` lines of a service's log.
    pub fn show_log(&self, name: &str, lines: usize) {
        let name = canonical_name(name);
        match self.store.read_log_tail(&name, lines) {
            None => info!("No logs found for {name}"),
            Some(tail) if tail.is_empty() => println!("(empty log)"),
            Some(tail) => {
                for line in tail {
                    println!("{line}");
                }
            }
        }
    }

    /// Prints a table of discovered units; `running_only` filters to live
    /// entries.
    pub fn list_services(&mut self, running_only: bool) {
        let names = self.registry.names();
        let mut rows = Vec::new();

        for name in names {
            let Some(unit) = self.registry.get(&name) else {
                continue;
            };
            let service_type = unit.service_type();
            let description: String = unit.description().chars().take(50).collect();

            let pid = self.store.read_pid(&name).unwrap_or(0);
            let is_running = pid > 0 && pid_alive(pid);
            if running_only && !is_running {
                continue;
            }

            let state = if is_running {
                format!("{GREEN}running{RESET}")
            } else {
                match self.store.read_status(&name) {
                    Some(record) if record.state == UnitState::Failed => {
                        format!("{RED}failed{RESET}")
                    }
                    _ => "stopped".to_string(),
                }
            };

            let flags = if self.config.is_critical(&name) {
                " [CRITICAL]".to_string()
            } else if self.config.is_unsupported_type(&service_type) {
                format!(" [UNSUPPORTED:{service_type}]")
            } else {
                String::new()
            };

            let pid_column = if is_running {
                pid.to_string()
            } else {
                "-".to_string()
            };
            rows.push((name, service_type, state, pid_column, description, flags));
        }

        if rows.is_empty() {
            println!(
                "{}",
                if running_only {
                    "No running services."
                } else {
                    "No services found."
                }
            );
            return;
        }

        println!(
            "{:<40} {:<10} {:<12} {:<8} {}",
            "SERVICE", "TYPE", "STATE", "PID", "DESCRIPTION"
        );
        println!("{}", "-".repeat(110));
        for (name, service_type, state, pid, description, flags) in &rows {
            let enabled_mark = if self.store.is_enabled(name) { "*" } else { " " };
            println!(
                "{enabled_mark} {name:<40} {service_type:<10} {state:<12} {pid:<8} {description}{flags}"
            );
        }
        println!();
        println!("Total: {} services (* = enabled)", rows.len());
    }

    /// The safety gate: refuses critical names before any side effect.
    fn gate(&self, name: &str) -> Result<(), ServicedError> {
        if self.config.is_critical(name) {
            error!("Refusing to manage critical service: {name}");
            return Err(ServicedError::CriticalRefused(name.to_string()));
        }
        Ok(())
    }

    /// Kills whatever is left of a previous incarnation of the service.
    ///
    /// The tracked pid always gets TERM-then-KILL. The wider `pkill -x`
    /// sweep by executable basename can take down unrelated processes that
    /// happen to share the binary, so it only runs with `aggressive_clean`
    /// and never for interpreter basenames.
    fn clean_stale(&mut self, name: &str, unit: &UnitFile) {
        if self.config.dry_run {
            return;
        }

        if let Some(pid) = self.store.read_pid(name)
            && pid_alive(pid)
        {
            debug!("Killing tracked PID {pid} for {name}");
            let _ = signal(pid, nix::sys::signal::Signal::SIGTERM);
            thread::sleep(PRECLEAN_GRACE);
            if pid_alive(pid) {
                let _ = signal(pid, nix::sys::signal::Signal::SIGKILL);
            }
            self.store.remove_pid(name);
        }

        if !self.config.aggressive_clean {
            return;
        }

        let commands = unit.exec_start();
        let Some(first) = commands.first() else {
            return;
        };
        let tokens = tokenize(first);
        let Some(program) = tokens.first() else {
            return;
        };
        let Some(basename) = Path::new(program.trim_start_matches(['-', '+', '!', '@', ':']))
            .file_name()
            .and_then(|name| name.to_str())
        else {
            return;
        };
        if self.config.is_interpreter(basename) {
            return;
        }

        debug!("Attempting pkill for '{basename}'");
        let _ = Command::new("pkill")
            .args(["-x", basename])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    /// Starts `Requires=` and `Wants=` dependencies, best-effort.
    ///
    /// The dependency graph is walked as an explicit preorder traversal
    /// with a visited set, so cycles terminate naturally; the collected
    /// units are then started deepest-first. Failures are logged and never
    /// abort the parent start.
    fn start_dependencies(&mut self, name: &str, unit: &UnitFile) {
        let mut visited: HashSet<String> = HashSet::from([name.to_string()]);
        let mut order: Vec<String> = Vec::new();
        let mut stack = service_dependencies(unit, name);

        while let Some(dep) = stack.pop() {
            if !visited.insert(dep.clone()) {
                continue;
            }
            if let Some(dep_unit) = self.registry.get(&dep).cloned() {
                stack.extend(service_dependencies(&dep_unit, &dep));
            }
            order.push(dep);
        }

        for dep in order.iter().rev() {
            self.start_dependency(dep);
        }
    }

    fn start_dependency(&mut self, dep: &str) {
        if let Some(pid) = self.store.read_pid(dep)
            && pid_alive(pid)
        {
            debug!("Dependency {dep} already running (PID {pid})");
            return;
        }
        if self.config.is_critical(dep) {
            debug!("Skipping critical dependency: {dep}");
            return;
        }
        let Some(dep_unit) = self.registry.get(dep) else {
            debug!("Dependency {dep} not found, skipping");
            return;
        };
        if self.config.is_unsupported_type(&dep_unit.service_type()) {
            debug!("Dependency {dep} has unsupported type, skipping");
            return;
        }

        if !self.config.quiet {
            info!("Starting dependency: {dep}");
        }
        if let Err(err) = self.start_internal(dep, false) {
            warn!("Failed to start dependency {dep}: {err}");
        }
    }

    fn run_post_commands(
        &mut self,
        _name: &str,
        unit: &UnitFile,
        env: &HashMap<String, String>,
    ) {
        for raw in unit.exec_start_post() {
            let cmd = resolve_command(&raw, env);
            self.launcher
                .run_foreground(&cmd, &self.exec_context(unit, env, None));
        }
    }

    fn exec_context<'a>(
        &self,
        unit: &'a UnitFile,
        env: &'a HashMap<String, String>,
        log_path: Option<&'a Path>,
    ) -> ExecContext<'a> {
        ExecContext {
            env,
            cwd: unit.working_directory(),
            user: unit.user(),
            group: unit.group(),
            log_path,
        }
    }

    fn record_status(
        &self,
        name: &str,
        state: UnitState,
        pid: u32,
        message: &str,
    ) -> Result<(), ServicedError> {
        if self.config.dry_run {
            return Ok(());
        }
        self.store.write_status(name, state, pid, message)?;
        Ok(())
    }
}

/// `.service` dependencies of a unit, excluding itself.
fn service_dependencies(unit: &UnitFile, name: &str) -> Vec<String> {
    unit.requires()
        .into_iter()
        .chain(unit.wants())
        .filter(|dep| dep.ends_with(".service") && dep != name)
        .collect()
}

fn signal(pid: pid_t, sig: nix::sys::signal::Signal) -> Result<(), nix::errno::Errno> {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), sig)
}

fn format_uptime(uptime: chrono::TimeDelta) -> String {
    let total = uptime.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
