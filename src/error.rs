//! Error handling for serviced.
use thiserror::Error;

/// Defines all possible errors that can occur in the supervisor.
#[derive(Debug, Error)]
pub enum ServicedError {
    /// The requested unit is not present in the registry.
    #[error("Service not found: {0}")]
    NotFound(String),

    /// The safety gate refused to manage a critical service.
    #[error("Refusing to manage critical service: {0}")]
    CriticalRefused(String),

    /// The unit declares a `Type=` the supervisor cannot start.
    #[error("Unsupported service type '{kind}' for {service}")]
    UnsupportedType {
        /// The service whose type is unsupported.
        service: String,
        /// The offending `Type=` value.
        kind: String,
    },

    /// The unit has no `ExecStart` command at all.
    #[error("No ExecStart defined for {0}")]
    MissingExecStart(String),

    /// A `ConditionPathExists=` check was not met.
    #[error("ConditionPathExists failed for {service}: {condition}")]
    ConditionFailed {
        /// The service whose condition failed.
        service: String,
        /// The raw condition expression.
        condition: String,
    },

    /// The launcher could not start the main process.
    #[error("Failed to start service '{0}'")]
    SpawnFailure(String),

    /// A checked foreground step exited non-zero.
    #[error("{phase} failed for {service} (exit {code})")]
    ExecStepFailure {
        /// The service whose step failed.
        service: String,
        /// Which phase failed (`ExecStartPre`, `ExecStart`).
        phase: &'static str,
        /// The non-zero exit code.
        code: i32,
    },

    /// The background process exited within the post-launch liveness window.
    #[error("{0} started but exited immediately")]
    DeadOnArrival(String),

    /// The target survived SIGKILL plus grace during `stop`.
    #[error("Failed to stop {service} (PID {pid} still alive)")]
    StopStuck {
        /// The service that could not be stopped.
        service: String,
        /// The pid that refused to die.
        pid: i32,
    },

    /// The supervisor refuses to signal init-range pids.
    #[error("Refusing to kill PID {0}")]
    ProtectedPid(i32),

    /// Insufficient permission to signal the tracked pid.
    #[error("Permission denied killing PID {0}")]
    SignalPermission(i32),

    /// Error for the persistent state store.
    #[error("State store error: {0}")]
    State(#[from] StateStoreError),
}

/// Error type for state store operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Error reading or writing a state file.
    #[error("State file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error serializing or parsing a status record.
    #[error("Failed to parse status record: {0}")]
    Parse(#[from] serde_json::Error),

    /// Enable/disable was refused by the filesystem.
    #[error("Permission denied updating enabled marker for '{0}' (need root?)")]
    EnablePermission(String),
}
