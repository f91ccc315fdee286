//! Constants and configuration defaults for the serviced supervisor.
//!
//! This module centralizes the magic numbers, paths, and blocklists used
//! throughout the supervisor. `config::SupervisorConfig` turns these into
//! overridable defaults.

use std::time::Duration;

// ============================================================================
// Unit Discovery
// ============================================================================

/// Directories scanned for `.service` files, in priority order.
/// A unit found in an earlier directory shadows one with the same basename
/// in a later directory.
pub const UNIT_SEARCH_PATHS: [&str; 4] = [
    "/etc/systemd/system",
    "/usr/local/lib/systemd/system",
    "/usr/lib/systemd/system",
    "/lib/systemd/system",
];

/// Symlink target that marks a unit as masked.
pub const MASK_TARGET: &str = "/dev/null";

// ============================================================================
// File System Layout
// ============================================================================

/// Root for per-invocation runtime state (pids, logs, status records).
pub const DEFAULT_STATE_DIR: &str = "/tmp/serviced";

/// Root for state that survives reboots (enabled links, audit log).
pub const DEFAULT_PERSIST_DIR: &str = "/var/lib/serviced";

/// Subdirectory of the state root holding `<name>.pid` files.
pub const PID_SUBDIR: &str = "pids";

/// Subdirectory of the state root holding `<name>.log` files.
pub const LOG_SUBDIR: &str = "logs";

/// Subdirectory of the state root holding `<name>.json` status records.
pub const STATUS_SUBDIR: &str = "status";

/// Subdirectory of the persistent root holding enabled markers.
pub const ENABLED_SUBDIR: &str = "enabled";

/// Audit log file name under the persistent root.
pub const ACTION_LOG_NAME: &str = "serviced.log";

/// Mode applied to every directory the supervisor creates.
pub const STATE_DIR_MODE: u32 = 0o755;

// ============================================================================
// Process Management Timing
// ============================================================================

/// Wall-clock limit for foreground (`ExecStartPre`, oneshot, forking) steps.
pub const FOREGROUND_TIMEOUT: Duration = Duration::from_secs(120);

/// Poll interval while waiting on a foreground child.
pub const FOREGROUND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Post-launch settle time before the liveness re-check for simple services.
pub const SIMPLE_SETTLE: Duration = Duration::from_millis(500);

/// Post-launch settle time for `notify` / `notify-reload` services.
pub const NOTIFY_SETTLE: Duration = Duration::from_millis(1500);

/// Grace period between SIGTERM and SIGKILL during the pre-start cleanup.
pub const PRECLEAN_GRACE: Duration = Duration::from_millis(100);

/// Number of liveness polls after SIGTERM during `stop`.
pub const STOP_POLL_ATTEMPTS: usize = 25;

/// Interval between `stop` liveness polls.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Grace period after SIGKILL before declaring the stop stuck.
pub const KILL_GRACE: Duration = Duration::from_millis(500);

/// Number of polls for a forking service's `PIDFile` to appear.
pub const PIDFILE_POLL_ATTEMPTS: usize = 20;

/// Interval between `PIDFile` polls.
pub const PIDFILE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause between `stop` and `start` during a restart.
pub const RESTART_DELAY: Duration = Duration::from_millis(500);

/// Pids that are never signalled, whatever the pid file says.
pub const PROTECTED_PIDS: [i32; 2] = [1, 2];

/// Synthetic pid reported for launches in dry-run mode.
pub const DRY_RUN_PID: u32 = 12345;

// ============================================================================
// Logging and Output
// ============================================================================

/// Default number of log lines shown by the `log` command.
pub const DEFAULT_LOG_LINES: usize = 50;

// ============================================================================
// Safety Blocklists
// ============================================================================

/// Service base names (without `.service`) the supervisor refuses to manage.
pub const CRITICAL_SERVICES: [&str; 54] = [
    // systemd internals
    "systemd-journald",
    "systemd-logind",
    "systemd-udevd",
    "systemd-resolved",
    "systemd-networkd",
    "systemd-timesyncd",
    "systemd-tmpfiles-setup",
    "systemd-tmpfiles-clean",
    "systemd-sysctl",
    "systemd-modules-load",
    "systemd-remount-fs",
    "systemd-update-utmp",
    "systemd-random-seed",
    "systemd-hibernate-resume",
    "systemd-suspend",
    "systemd-halt",
    "systemd-poweroff",
    "systemd-reboot",
    "systemd-kexec",
    "systemd-machine-id-commit",
    "systemd-binfmt",
    "systemd-coredump",
    "systemd-ask-password-console",
    "systemd-ask-password-wall",
    "systemd-boot-random-seed",
    "systemd-fsck",
    "systemd-growfs",
    "systemd-makefs",
    "systemd-pstore",
    "systemd-quotacheck",
    "systemd-vconsole-setup",
    "systemd-firstboot",
    "systemd-sysusers",
    "systemd-homed",
    "systemd-userdbd",
    "systemd-oomd",
    // core system
    "init",
    "dbus",
    "dbus-broker",
    "dbus-daemon",
    "udev",
    "eudev",
    "mdev",
    // login / session
    "getty@tty1",
    "serial-getty@",
    // mount / filesystem
    "local-fs.target",
    "remote-fs.target",
    "swap.target",
    "tmp.mount",
    "dev-hugepages.mount",
    "dev-mqueue.mount",
    "sys-kernel-debug.mount",
    "sys-kernel-tracing.mount",
    "sys-fs-fuse-connections.mount",
];

/// Name prefixes the supervisor refuses to manage.
pub const CRITICAL_PREFIXES: [&str; 8] = [
    "systemd-",
    "initrd-",
    "rescue.",
    "emergency.",
    "halt.",
    "poweroff.",
    "reboot.",
    "kexec.",
];

/// Service `Type=` values the supervisor cannot start.
pub const UNSUPPORTED_TYPES: [&str; 1] = ["dbus"];

/// Interpreter basenames excluded from the aggressive `pkill` sweep.
/// Killing every `bash` or `python3` on the host is too much collateral.
pub const INTERPRETER_BASENAMES: [&str; 6] =
    ["bash", "sh", "python", "python3", "perl", "ruby"];
