use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "autofix.yaml";
pub const RESULTS_DIR: &str = "execution_results";
pub const BACKUP_DIR: &str = "backup_scripts";

/// Reserved record key holding the absolute project root of a sweep.
pub const PROJECT_ROOT_KEY: &str = "_project_root";

pub const SUMMARY_PREFIX: &str = "summary_";
pub const LOG_SUFFIX: &str = ".log.txt";
pub const BACKUP_MARKER: &str = ".bak_";

/// Second-resolution timestamp used in record and backup names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_FILE)
}

pub fn project_results_dir(results_root: &Path, project: &str) -> PathBuf {
    results_root.join(project)
}

pub fn summary_path(results_root: &Path, project: &str, timestamp: &str, seq: u64) -> PathBuf {
    project_results_dir(results_root, project).join(format!("{SUMMARY_PREFIX}{timestamp}_{seq:04}.json"))
}

/// Per-unit log file: `<results_root>/<project>/<rel_key>.log.txt`.
pub fn unit_log_path(results_root: &Path, project: &str, rel_key: &str) -> PathBuf {
    let mut path = project_results_dir(results_root, project);
    for part in rel_key.split('/') {
        path.push(part);
    }
    let name = path
        .file_name()
        .map(|n| format!("{}{LOG_SUFFIX}", n.to_string_lossy()))
        .unwrap_or_else(|| LOG_SUFFIX.to_string());
    path.set_file_name(name);
    path
}

pub fn backup_dir(backup_root: &Path, project: &str, rel_parent: &Path) -> PathBuf {
    backup_root.join(project).join(rel_parent)
}

pub fn backup_file_name(file_name: &str, timestamp: &str) -> String {
    format!("{file_name}{BACKUP_MARKER}{timestamp}")
}

/// Project name is the last component of the project root.
pub fn project_name(project_root: &Path) -> String {
    project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

/// Forward-slash relative key for `path` under `root`, or `None` if `path`
/// is not inside `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Record file names
// ---------------------------------------------------------------------------

/// Parsed pieces of a `summary_<timestamp>[_<seq>].json` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryName {
    pub timestamp: String,
    /// Records written before sequence numbers existed parse as `0`.
    pub seq: u64,
}

static SUMMARY_RE: OnceLock<Regex> = OnceLock::new();

fn summary_re() -> &'static Regex {
    SUMMARY_RE.get_or_init(|| {
        Regex::new(r"^summary_(\d{8}_\d{6})(?:_(\d+))?\.json$").expect("summary regex is valid")
    })
}

pub fn parse_summary_name(file_name: &str) -> Option<SummaryName> {
    let caps = summary_re().captures(file_name)?;
    let timestamp = caps.get(1)?.as_str().to_string();
    let seq = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some(SummaryName { timestamp, seq })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
