use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::oracle::OracleError;

#[derive(Debug, Error)]
pub enum AutofixError {
    #[error("timed out after {}s", .0.as_secs_f64())]
    ExecutionTimeout(Duration),

    #[error("failed to launch process: {0}")]
    LaunchFailure(String),

    #[error("{} is not inside project root {}", path.display(), root.display())]
    PathError { path: PathBuf, root: PathBuf },

    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record not found: {}", .0.display())]
    RecordNotFound(PathBuf),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("project path does not exist or is not a directory: {}", .0.display())]
    InvalidProject(PathBuf),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AutofixError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutofixError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AutofixError>;
