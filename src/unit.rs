//! # Unit File Parser
//!
//! Parses systemd `.service` unit files into sections and key-value
//! sequences, with the systemd quirks the supervisor relies on: backslash
//! continuation lines, `#`/`;` comments, repeated keys accumulating into an
//! ordered list, and an empty assignment resetting that list.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use strum_macros::{Display, EnumString};
use tracing::debug;

/// Dispatch category derived from the `Type=` value.
///
/// Anything the supervisor does not special-case is launched like `simple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceKind {
    /// Long-running main process, tracked directly.
    Simple,
    /// Same launch path as `simple`.
    Exec,
    /// Parent exits after forking; pid recovered from `PIDFile`.
    Forking,
    /// Runs to completion in the foreground.
    Oneshot,
    /// Launched like `simple` with a longer settle window.
    Notify,
    /// Launched like `simple` with a longer settle window.
    NotifyReload,
    /// Launched like `simple`.
    Idle,
}

impl ServiceKind {
    /// Maps a lowercased `Type=` value onto a dispatch category, treating
    /// unknown values as `simple`.
    pub fn classify(service_type: &str) -> Self {
        Self::from_str(service_type).unwrap_or(Self::Simple)
    }
}

/// A parsed unit file: sections mapping keys to ordered value sequences.
#[derive(Debug, Clone, Default)]
pub struct UnitFile {
    /// Absolute path the unit was loaded from, if any.
    pub path: Option<PathBuf>,
    sections: HashMap<String, HashMap<String, Vec<String>>>,
}

impl UnitFile {
    /// Parses a unit file from disk.
    ///
    /// An unreadable file yields an empty record; the failure is only
    /// visible at debug level, matching the registry's tolerance for
    /// half-broken unit directories.
    pub fn parse(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let mut unit = Self::parse_str(&content);
                unit.path = Some(path.to_path_buf());
                unit
            }
            Err(err) => {
                debug!("Failed to parse {}: {err}", path.display());
                Self {
                    path: Some(path.to_path_buf()),
                    sections: HashMap::new(),
                }
            }
        }
    }

    /// Parses unit file content without an associated path.
    pub fn parse_str(content: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, Vec<String>>> =
            HashMap::new();
        let mut section: Option<String> = None;
        let mut pending = String::new();

        for raw_line in content.lines() {
            // Fold continuation lines into one logical line.
            if let Some(stripped) = raw_line.strip_suffix('\\') {
                pending.push_str(stripped.trim());
                pending.push(' ');
                continue;
            }
            let line = if pending.is_empty() {
                raw_line.trim().to_string()
            } else {
                let joined = format!("{pending}{}", raw_line.trim());
                pending.clear();
                joined.trim().to_string()
            };

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') && line.len() > 2 {
                let name = line[1..line.len() - 1].to_string();
                sections.entry(name.clone()).or_default();
                section = Some(name);
                continue;
            }

            // Entries outside any section are dropped.
            let Some(ref current) = section else { continue };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim();
            let values = sections
                .entry(current.clone())
                .or_default()
                .entry(key)
                .or_default();
            // An empty assignment resets the accumulated list (systemd
            // behavior); anything else appends.
            if value.is_empty() {
                values.clear();
            } else {
                values.push(value.to_string());
            }
        }

        Self {
            path: None,
            sections,
        }
    }

    /// Last value for a key, the most specific per systemd semantics.
    pub fn scalar(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(key)?
            .last()
            .map(String::as_str)
    }

    /// All values for a key, in declaration order.
    pub fn list(&self, section: &str, key: &str) -> Vec<String> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Boolean value of a key (`yes`/`true`/`1`/`on` are truthy).
    pub fn boolean(&self, section: &str, key: &str, default: bool) -> bool {
        match self.scalar(section, key) {
            Some(value) if !value.is_empty() => {
                matches!(value.to_lowercase().as_str(), "yes" | "true" | "1" | "on")
            }
            _ => default,
        }
    }

    /// Whether the unit declares the given section.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// `Description=`, falling back to the file basename.
    pub fn description(&self) -> String {
        self.scalar("Unit", "Description")
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.path
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string())
            })
    }

    /// Lowercased `Type=`, defaulting to `simple`.
    pub fn service_type(&self) -> String {
        self.scalar("Service", "Type")
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "simple".to_string())
    }

    /// Dispatch category for this unit.
    pub fn kind(&self) -> ServiceKind {
        ServiceKind::classify(&self.service_type())
    }

    /// Ordered `ExecStart=` commands.
    pub fn exec_start(&self) -> Vec<String> {
        self.list("Service", "ExecStart")
    }

    /// Ordered `ExecStartPre=` commands.
    pub fn exec_start_pre(&self) -> Vec<String> {
        self.list("Service", "ExecStartPre")
    }

    /// Ordered `ExecStartPost=` commands.
    pub fn exec_start_post(&self) -> Vec<String> {
        self.list("Service", "ExecStartPost")
    }

    /// Ordered `ExecStop=` commands.
    pub fn exec_stop(&self) -> Vec<String> {
        self.list("Service", "ExecStop")
    }

    /// `PIDFile=` path, if declared.
    pub fn pid_file(&self) -> Option<&str> {
        self.scalar("Service", "PIDFile")
    }

    /// `WorkingDirectory=`, if declared.
    pub fn working_directory(&self) -> Option<&str> {
        self.scalar("Service", "WorkingDirectory")
    }

    /// `User=`, if declared.
    pub fn user(&self) -> Option<&str> {
        self.scalar("Service", "User")
    }

    /// `Group=`, if declared.
    pub fn group(&self) -> Option<&str> {
        self.scalar("Service", "Group")
    }

    /// `EnvironmentFile=`, if declared.
    pub fn environment_file(&self) -> Option<&str> {
        self.scalar("Service", "EnvironmentFile")
    }

    /// `RemainAfterExit=` (defaults to false).
    pub fn remain_after_exit(&self) -> bool {
        self.boolean("Service", "RemainAfterExit", false)
    }

    /// `ConditionPathExists=`, if declared. A leading `!` negates the check.
    pub fn condition_path_exists(&self) -> Option<&str> {
        self.scalar("Unit", "ConditionPathExists")
    }

    /// Whitespace-split `Requires=` entries.
    pub fn requires(&self) -> Vec<String> {
        self.split_scalar("Unit", "Requires")
    }

    /// Whitespace-split `Wants=` entries.
    pub fn wants(&self) -> Vec<String> {
        self.split_scalar("Unit", "Wants")
    }

    /// Whitespace-split `After=` entries.
    pub fn after(&self) -> Vec<String> {
        self.split_scalar("Unit", "After")
    }

    /// Inline `Environment=` entries parsed into a map.
    ///
    /// Each entry is `KEY=VALUE`, possibly wrapped in quotes as a whole or
    /// around the value only; one matching pair of quotes is stripped.
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for entry in self.list("Service", "Environment") {
            let entry = strip_quotes(entry.trim());
            if let Some((key, value)) = entry.split_once('=') {
                env.insert(
                    key.trim().to_string(),
                    strip_quotes(value.trim()).to_string(),
                );
            }
        }
        env
    }

    fn split_scalar(&self, section: &str, key: &str) -> Vec<String> {
        self.scalar(section, key)
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Removes one matching pair of surrounding single or double quotes.
pub fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
