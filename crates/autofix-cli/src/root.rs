use std::path::{Path, PathBuf};

use autofix_core::paths::CONFIG_FILE;

/// Resolve the workspace directory holding `autofix.yaml`, results and
/// backups.
///
/// Priority:
/// 1. `--workspace` flag / `AUTOFIX_WORKSPACE` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `autofix.yaml`
/// 3. Fall back to `cwd`
pub fn resolve_workspace(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match explicit {
        Some(p) => p.to_path_buf(),
        None => find_config_ancestor(&cwd).unwrap_or(cwd),
    }
}

fn find_config_ancestor(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}
