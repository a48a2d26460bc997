//! Unit discovery and the execution sweep.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{AutofixError, Result};
use crate::paths;
use crate::record::SweepResults;
use crate::runner::{run_unit, RunnerSettings};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// File extension of units, without the dot.
    pub extension: String,
    /// Units with exactly this file name run before everything else.
    pub entry_point: String,
    /// Directory names pruned from discovery wherever they appear.
    pub ignored_dirs: Vec<String>,
    pub runner: RunnerSettings,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            entry_point: "main.py".to_string(),
            ignored_dirs: ["__pycache__", "venv", "env", "Scripts", ".venv", ".env"]
                .into_iter()
                .map(String::from)
                .collect(),
            runner: RunnerSettings::default(),
        }
    }
}

impl SweepSettings {
    fn is_ignored(&self, entry: &DirEntry) -> bool {
        // The project root itself is never pruned, whatever its name.
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.ignored_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn is_unit(&self, entry: &DirEntry) -> bool {
        let ext = self.extension.trim_start_matches('.');
        entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == ext)
                .unwrap_or(false)
    }
}

/// Recursively list units under `project_root` in deterministic
/// (file-name sorted, depth-first) discovery order.
pub fn discover_units(project_root: &Path, settings: &SweepSettings) -> Vec<PathBuf> {
    let mut units = Vec::new();
    for entry in WalkDir::new(project_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !settings.is_ignored(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if settings.is_unit(&entry) {
            units.push(entry.into_path());
        }
    }
    units
}

/// Entry points first, then everything else, each group in discovery order.
pub fn order_units(units: Vec<PathBuf>, entry_point: &str) -> Vec<PathBuf> {
    let (mut first, rest): (Vec<_>, Vec<_>) = units.into_iter().partition(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n == entry_point)
            .unwrap_or(false)
    });
    first.extend(rest);
    first
}

/// Run every discovered unit once. The project root must be an existing
/// directory; per-unit failures are captured in the results.
pub fn sweep(project_root: &Path, settings: &SweepSettings) -> Result<SweepResults> {
    if !project_root.is_dir() {
        return Err(AutofixError::InvalidProject(project_root.to_path_buf()));
    }

    let units = order_units(discover_units(project_root, settings), &settings.entry_point);
    info!(
        "found {} unit(s) in project {}",
        units.len(),
        paths::project_name(project_root)
    );

    let mut results = SweepResults::new();
    for unit in &units {
        let Some(key) = paths::relative_key(project_root, unit) else {
            continue;
        };
        let outcome = run_unit(unit, project_root, &settings.runner);
        results.insert(key, outcome);
    }
    Ok(results)
}
