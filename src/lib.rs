//! Lightweight supervisor for systemd unit files on systems without systemd.

#![warn(unused_crate_dependencies)]
// These dependencies are only used in the binary (src/bin/main.rs)
// Test dependencies are only used in test code
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
use strum as _;
#[cfg(test)]
use sysinfo as _;
#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;

/// CLI parsing.
pub mod cli;

/// Exec command-line resolution.
pub mod command;

/// Supervisor configuration.
pub mod config;

/// Constants.
pub mod constants;

/// Per-service environment resolution.
pub mod environment;

/// Errors.
pub mod error;

/// PID liveness checks.
pub mod process;

/// Unit discovery.
pub mod registry;

/// Process launching.
pub mod spawn;

/// Persistent service state.
pub mod state;

/// Service supervisor.
pub mod supervisor;

/// Unit file parsing.
pub mod unit;
