//! Persistence of sweep records and per-unit logs.
//!
//! Records live at `<results_root>/<project>/summary_<timestamp>_<seq>.json`.
//! The sequence number increases by one per project on every save, so two
//! sweeps inside the same second still get distinct, ordered names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{AutofixError, Result};
use crate::io::atomic_write;
use crate::paths::{self, SummaryName};
use crate::record::{SweepRecord, SweepResults};

/// How `find_latest` decides which record is the most recent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestStrategy {
    /// Greatest filesystem modification time, ties broken by sequence.
    ///
    /// Last write wins: clock skew or coarse mtime resolution on the
    /// results filesystem can select the wrong record.
    #[default]
    ModifiedTime,
    /// Greatest sequence number embedded in the file name.
    Sequence,
}

struct Candidate {
    path: PathBuf,
    name: SummaryName,
    modified: SystemTime,
}

pub struct ResultStore {
    results_root: PathBuf,
    strategy: LatestStrategy,
}

impl ResultStore {
    pub fn new(results_root: impl Into<PathBuf>, strategy: LatestStrategy) -> Self {
        Self {
            results_root: results_root.into(),
            strategy,
        }
    }

    /// Persist `results` as a new record and refresh the per-unit logs.
    /// Only the record is required; a log that cannot be written is logged
    /// and skipped.
    /// Returns the record path, which doubles as its id.
    pub fn save(
        &self,
        project_name: &str,
        project_root: &Path,
        results: &SweepResults,
    ) -> Result<PathBuf> {
        let seq = self
            .candidates(project_name)?
            .iter()
            .map(|c| c.name.seq)
            .max()
            .unwrap_or(0)
            + 1;
        let timestamp = chrono::Local::now()
            .format(paths::TIMESTAMP_FORMAT)
            .to_string();
        let path = paths::summary_path(&self.results_root, project_name, &timestamp, seq);

        let record = SweepRecord::new(project_root, results.clone());
        atomic_write(&path, record.to_string_pretty()?.as_bytes())?;

        for (key, outcome) in results.iter() {
            let log_path = paths::unit_log_path(&self.results_root, project_name, key);
            let text = format!(
                "Exit code: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}\n",
                outcome.exit_code, outcome.stdout, outcome.stderr
            );
            if let Err(e) = atomic_write(&log_path, text.as_bytes()) {
                warn!("could not write log for {key}: {e}");
            }
        }

        info!("results saved in {}", path.display());
        Ok(path)
    }

    /// The most recent record for `project_name`, or `None` if there is none.
    pub fn find_latest(&self, project_name: &str) -> Result<Option<PathBuf>> {
        let candidates = self.candidates(project_name)?;
        let latest = match self.strategy {
            LatestStrategy::ModifiedTime => candidates
                .into_iter()
                .max_by(|a, b| (a.modified, a.name.seq).cmp(&(b.modified, b.name.seq))),
            LatestStrategy::Sequence => candidates.into_iter().max_by(|a, b| {
                (a.name.seq, &a.name.timestamp).cmp(&(b.name.seq, &b.name.timestamp))
            }),
        };
        if let Some(c) = &latest {
            debug!("latest record for {project_name}: {}", c.path.display());
        }
        Ok(latest.map(|c| c.path))
    }

    /// All record paths for `project_name`, oldest first by sequence.
    pub fn list(&self, project_name: &str) -> Result<Vec<PathBuf>> {
        let mut candidates = self.candidates(project_name)?;
        candidates.sort_by(|a, b| {
            (a.name.seq, &a.name.timestamp).cmp(&(b.name.seq, &b.name.timestamp))
        });
        Ok(candidates.into_iter().map(|c| c.path).collect())
    }

    /// Read and parse a record file.
    pub fn load(path: &Path) -> Result<SweepRecord> {
        if !path.is_file() {
            return Err(AutofixError::RecordNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path).map_err(|e| AutofixError::fs(path, e))?;
        SweepRecord::parse(&data)
    }

    fn candidates(&self, project_name: &str) -> Result<Vec<Candidate>> {
        let dir = paths::project_results_dir(&self.results_root, project_name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| AutofixError::fs(&dir, e))? {
            let entry = entry.map_err(|e| AutofixError::fs(&dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(paths::parse_summary_name) else {
                continue;
            };
            let meta = entry.metadata().map_err(|e| AutofixError::fs(entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            out.push(Candidate {
                path: entry.path(),
                name,
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
