//! Per-service environment resolution.
//!
//! Layered in increasing precedence: the supervisor's own environment, then
//! the unit's `EnvironmentFile=`, then inline `Environment=` entries.

use std::{collections::HashMap, env, fs, path::Path};

use tracing::warn;

use crate::unit::{UnitFile, strip_quotes};

/// Builds the complete environment map for a unit.
pub fn build_environment(unit: &UnitFile) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = env::vars().collect();
    if let Some(env_file) = unit.environment_file() {
        env.extend(load_environment_file(env_file));
    }
    env.extend(unit.environment());
    env
}

/// Loads `KEY=VALUE` pairs from an `EnvironmentFile=` target.
///
/// A leading `-` marks the file optional: a missing optional file is silent,
/// a missing required file only warns. Lines starting with `#` are comments;
/// one matching pair of quotes around a value is stripped.
pub fn load_environment_file(raw_path: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();

    let (optional, path) = match raw_path.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, raw_path),
    };

    if !Path::new(path).is_file() {
        if !optional {
            warn!("EnvironmentFile not found: {path}");
        }
        return env;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            if !optional {
                warn!("Failed to read EnvironmentFile {path}: {err}");
            }
            return env;
        }
    };

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            env.insert(
                key.trim().to_string(),
                strip_quotes(value.trim()).to_string(),
            );
        }
    }

    env
}
