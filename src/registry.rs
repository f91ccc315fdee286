//! Unit discovery and lookup.
//!
//! Scans the configured search path for `.service` files, resolving
//! symlinks (a link to the null device means the unit is masked and is
//! skipped entirely) and deduplicating by basename with first-wins, the
//! same shadowing rule systemd applies across its unit directories.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{constants::MASK_TARGET, unit::UnitFile};

/// Appends `.service` to a name that lacks it.
pub fn canonical_name(name: &str) -> String {
    if name.ends_with(".service") {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}

/// Lazily discovered map of unit basenames to parsed unit files.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    paths: Vec<PathBuf>,
    units: HashMap<String, UnitFile>,
    discovered: bool,
}

impl UnitRegistry {
    /// Creates a registry over the given search path.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            units: HashMap::new(),
            discovered: false,
        }
    }

    /// Scans the search path once per registry lifetime.
    pub fn discover(&mut self) {
        if self.discovered {
            return;
        }
        self.discovered = true;

        // A basename is claimed by its first occurrence even when that
        // occurrence is masked or broken, so a /dev/null link in a higher
        // priority directory hides the unit everywhere.
        let mut seen: HashSet<String> = HashSet::new();
        for unit_dir in &self.paths {
            let Ok(entries) = fs::read_dir(unit_dir) else {
                continue;
            };
            let mut names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.ends_with(".service"))
                .collect();
            names.sort();

            for name in names {
                if !seen.insert(name.clone()) {
                    // First match wins, like systemd's unit path shadowing.
                    continue;
                }
                let candidate = unit_dir.join(&name);
                let Some(resolved) = resolve_unit_path(unit_dir, &candidate) else {
                    continue;
                };
                self.units.insert(name, UnitFile::parse(&resolved));
            }
        }

        debug!("Discovered {} services", self.units.len());
    }

    /// Looks up a unit by (possibly non-canonical) name.
    pub fn get(&mut self, name: &str) -> Option<&UnitFile> {
        self.discover();
        self.units.get(&canonical_name(name))
    }

    /// All discovered unit basenames, sorted.
    pub fn names(&mut self) -> Vec<String> {
        self.discover();
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolves a unit file path through at most one level of symlink.
///
/// Returns `None` for masked units (link to the null device) and broken
/// links; relative targets are taken relative to the containing directory.
fn resolve_unit_path(unit_dir: &Path, candidate: &Path) -> Option<PathBuf> {
    let metadata = fs::symlink_metadata(candidate).ok()?;
    if !metadata.file_type().is_symlink() {
        return Some(candidate.to_path_buf());
    }

    let target = fs::read_link(candidate).ok()?;
    if target == Path::new(MASK_TARGET) {
        debug!("Skipping masked unit {}", candidate.display());
        return None;
    }
    let resolved = if target.is_absolute() {
        target
    } else {
        unit_dir.join(target)
    };
    if !resolved.exists() {
        debug!("Skipping broken symlink {}", candidate.display());
        return None;
    }
    Some(resolved)
}
