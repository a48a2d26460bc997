use crate::error::{AutofixError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
///
/// If `path` already exists its permissions are carried over to the new file,
/// so an executable script stays executable after being replaced.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let previous = std::fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AutofixError::fs(dir, e))?;
    tmp.write_all(data).map_err(|e| AutofixError::fs(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| AutofixError::fs(tmp.path(), e))?;
    if let Some(perms) = previous {
        std::fs::set_permissions(tmp.path(), perms).map_err(|e| AutofixError::fs(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| AutofixError::fs(path, e.error))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| AutofixError::fs(path, e))
}

/// Copy `src` to `dest`, never replacing an existing file.
///
/// When `dest` is taken, `_1`, `_2`, ... is appended to its file name until a
/// free name is found. Returns the path actually written.
pub fn copy_unique(src: &Path, dest: &Path) -> Result<PathBuf> {
    let bytes = std::fs::read(src).map_err(|e| AutofixError::fs(src, e))?;
    let perms = std::fs::metadata(src)
        .map_err(|e| AutofixError::fs(src, e))?
        .permissions();

    let base = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = dest.to_path_buf();
    let mut n = 0u32;
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut f) => {
                let written = f.write_all(&bytes).and_then(|_| f.sync_all());
                drop(f);
                discard_on_error(&candidate, written)?;
                // Best-effort: a backup with default permissions is still a backup.
                let _ = std::fs::set_permissions(&candidate, perms);
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                n += 1;
                candidate.set_file_name(format!("{base}_{n}"));
            }
            Err(e) => return Err(AutofixError::fs(&candidate, e)),
        }
    }
}

/// Remove the partially written `path` when `written` failed, so a retry
/// does not leave a truncated copy behind.
fn discard_on_error(path: &Path, written: std::io::Result<()>) -> Result<()> {
    written.map_err(|e| {
        let _ = std::fs::remove_file(path);
        AutofixError::fs(path, e)
    })
}
