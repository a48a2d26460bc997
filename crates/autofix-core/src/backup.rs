use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AutofixError, Result};
use crate::io::{atomic_write, copy_unique, ensure_dir};
use crate::paths;

/// Takes a timestamped copy of a unit before replacing its content.
///
/// Backups mirror the unit's location under
/// `<backup_root>/<project>/<relative_dirs>/` and are never overwritten.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    /// Back up `unit`, then replace it in whole with `new_content`.
    ///
    /// The copy is written and synced before the unit is touched; if anything
    /// fails the unit keeps its current content. A symlinked unit is resolved
    /// first: its target is backed up and rewritten and the link stays.
    /// Returns the backup path.
    pub fn backup_and_patch(
        &self,
        unit: &Path,
        new_content: &str,
        project_name: &str,
        project_root: &Path,
    ) -> Result<PathBuf> {
        let (target, rel) = resolve_in_root(unit, project_root)?;
        let file_name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AutofixError::PathError {
                path: unit.to_path_buf(),
                root: project_root.to_path_buf(),
            })?;
        let rel_parent = rel.parent().unwrap_or(Path::new(""));

        let dir = paths::backup_dir(&self.backup_root, project_name, rel_parent);
        ensure_dir(&dir)?;

        let timestamp = chrono::Local::now()
            .format(paths::TIMESTAMP_FORMAT)
            .to_string();
        let backup = copy_unique(
            &target,
            &dir.join(paths::backup_file_name(&file_name, &timestamp)),
        )?;
        info!("backup {} -> {}", unit.display(), backup.display());

        atomic_write(&target, new_content.as_bytes())?;
        info!("patched {}", target.display());
        Ok(backup)
    }
}

/// Canonical `unit` and its path relative to `project_root`. Symlinks and
/// `..` are resolved, so a link pointing outside the root is rejected.
fn resolve_in_root(unit: &Path, project_root: &Path) -> Result<(PathBuf, PathBuf)> {
    let path_error = || AutofixError::PathError {
        path: unit.to_path_buf(),
        root: project_root.to_path_buf(),
    };
    let root = project_root
        .canonicalize()
        .map_err(|e| AutofixError::fs(project_root, e))?;
    let unit_abs = unit.canonicalize().map_err(|e| AutofixError::fs(unit, e))?;
    let rel = unit_abs
        .strip_prefix(&root)
        .map_err(|_| path_error())?
        .to_path_buf();
    if rel.as_os_str().is_empty() {
        return Err(path_error());
    }
    Ok((unit_abs, rel))
}
