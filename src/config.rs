//! Supervisor configuration.
//!
//! The original design kept paths, blocklists, and mode flags as module-level
//! globals. Here they live on an explicit [`SupervisorConfig`] value that is
//! passed to the supervisor, with the constants module providing defaults and
//! a small set of `SERVICED_*` environment variables allowing redirection
//! (used heavily by the test suite to sandbox state under temp directories).

use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
};

use crate::constants::{
    ACTION_LOG_NAME, CRITICAL_PREFIXES, CRITICAL_SERVICES, DEFAULT_PERSIST_DIR,
    DEFAULT_STATE_DIR, ENABLED_SUBDIR, INTERPRETER_BASENAMES, LOG_SUBDIR, PID_SUBDIR,
    STATUS_SUBDIR, UNIT_SEARCH_PATHS, UNSUPPORTED_TYPES,
};

/// Environment variable overriding the unit search path (colon-separated).
pub const UNIT_PATH_ENV: &str = "SERVICED_UNIT_PATH";

/// Environment variable overriding the runtime state root.
pub const STATE_DIR_ENV: &str = "SERVICED_STATE_DIR";

/// Environment variable overriding the persistent root.
pub const PERSIST_DIR_ENV: &str = "SERVICED_PERSIST_DIR";

/// Configuration owned by a [`crate::supervisor::Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directories scanned for unit files, first match wins.
    pub unit_paths: Vec<PathBuf>,
    /// Root for pids, logs, and status records.
    pub state_dir: PathBuf,
    /// Root for enabled markers and the audit log.
    pub persist_dir: PathBuf,
    /// When set, no process is spawned or signalled and no state is written.
    pub dry_run: bool,
    /// Suppresses per-service info lines; the boot of all enabled services
    /// raises this around its loop so only the OK/FAILED transcript shows.
    pub quiet: bool,
    /// Opt-in `pkill -x` sweep of stale processes before each start.
    pub aggressive_clean: bool,
    /// Base names the supervisor refuses to manage.
    pub critical_services: HashSet<String>,
    /// Name prefixes the supervisor refuses to manage.
    pub critical_prefixes: Vec<String>,
    /// `Type=` values that cannot be started.
    pub unsupported_types: HashSet<String>,
    /// Interpreter basenames excluded from the aggressive sweep.
    pub interpreters: HashSet<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            unit_paths: UNIT_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
            dry_run: false,
            quiet: false,
            aggressive_clean: false,
            critical_services: CRITICAL_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            critical_prefixes: CRITICAL_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            unsupported_types: UNSUPPORTED_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            interpreters: INTERPRETER_BASENAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SupervisorConfig {
    /// Builds a config from defaults plus `SERVICED_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(paths) = env::var(UNIT_PATH_ENV) {
            config.unit_paths = paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Ok(dir) = env::var(STATE_DIR_ENV) {
            config.state_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(PERSIST_DIR_ENV) {
            config.persist_dir = PathBuf::from(dir);
        }

        config
    }

    /// Directory holding `<name>.pid` files.
    pub fn pid_dir(&self) -> PathBuf {
        self.state_dir.join(PID_SUBDIR)
    }

    /// Directory holding `<name>.log` files.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join(LOG_SUBDIR)
    }

    /// Directory holding `<name>.json` status records.
    pub fn status_dir(&self) -> PathBuf {
        self.state_dir.join(STATUS_SUBDIR)
    }

    /// Directory holding enabled markers.
    pub fn enabled_dir(&self) -> PathBuf {
        self.persist_dir.join(ENABLED_SUBDIR)
    }

    /// Path of the persistent audit log.
    pub fn action_log_path(&self) -> PathBuf {
        self.persist_dir.join(ACTION_LOG_NAME)
    }

    /// Whether a canonical service name is refused by the safety gate.
    ///
    /// A name is critical when its base (without `.service`) is in the
    /// critical set, when it carries a critical prefix, or when it is a
    /// template instance pattern (`@.`).
    pub fn is_critical(&self, name: &str) -> bool {
        let base = name.strip_suffix(".service").unwrap_or(name);
        if self.critical_services.contains(base) {
            return true;
        }
        if self
            .critical_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
        {
            return true;
        }
        name.contains("@.")
    }

    /// Whether a lowercased `Type=` value is on the unsupported blocklist.
    pub fn is_unsupported_type(&self, service_type: &str) -> bool {
        self.unsupported_types.contains(service_type)
    }

    /// Whether a basename belongs to the interpreter exclusion list.
    pub fn is_interpreter(&self, basename: &str) -> bool {
        self.interpreters.contains(basename)
    }

    /// Rebases all state under `root` for sandboxed runs.
    pub fn with_sandbox(mut self, root: &Path) -> Self {
        self.state_dir = root.join("state");
        self.persist_dir = root.join("persist");
        self
    }
}
