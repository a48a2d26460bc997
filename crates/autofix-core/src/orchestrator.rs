//! The run / evaluate / repair loop.
//!
//! ```text
//! Running(1) ──sweep──▶ latest record ──all passing──▶ Success
//!     ▲                      │
//!     │                 failures left
//!     │                      ▼
//!     └──sleep── Running(n+1) ◀── repair ──(n == max)──▶ Exhausted
//!
//! any step that cannot be carried out ──▶ Failure
//! ```
//!
//! The steps themselves sit behind [`LoopSteps`] so they can run in this
//! process ([`InProcessSteps`]) or as separate commands.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::backup::BackupManager;
use crate::config::Config;
use crate::error::Result;
use crate::oracle::RepairOracle;
use crate::paths;
use crate::repair::RepairPass;
use crate::store::ResultStore;
use crate::sweep::{sweep, SweepSettings};

// ---------------------------------------------------------------------------
// LoopConfig / LoopState / LoopOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Pause between a repair pass and the next sweep.
    pub sleep_between: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            sleep_between: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LoopState {
    Running(u32),
    Success,
    Failure(String),
    Exhausted,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Running(n) => write!(f, "running (iteration {n})"),
            LoopState::Success => write!(f, "success"),
            LoopState::Failure(reason) => f.write_str(reason),
            LoopState::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopOutcome {
    pub state: LoopState,
    /// Number of iterations started.
    pub iterations: u32,
}

impl LoopOutcome {
    /// Only `Success` counts as success.
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Success
    }
}

// ---------------------------------------------------------------------------
// LoopSteps
// ---------------------------------------------------------------------------

/// The pass-level operations the loop drives. An `Err` from any of them
/// ends the loop in `Failure`.
pub trait LoopSteps {
    /// Run every unit of the project once and persist a new record.
    fn sweep(&mut self, project_root: &Path) -> Result<()>;

    /// Path of the most recent record for the project, if any.
    fn latest_record(&mut self, project_name: &str) -> Result<Option<PathBuf>>;

    /// Apply fixes for the failing units of the record at `record`.
    fn repair(&mut self, record: &Path) -> Result<()>;
}

/// Runs sweeps and repair passes directly in the calling process.
pub struct InProcessSteps<'a> {
    sweep: SweepSettings,
    store: ResultStore,
    backups: BackupManager,
    oracle: &'a dyn RepairOracle,
}

impl<'a> InProcessSteps<'a> {
    pub fn new(
        sweep: SweepSettings,
        store: ResultStore,
        backups: BackupManager,
        oracle: &'a dyn RepairOracle,
    ) -> Self {
        Self {
            sweep,
            store,
            backups,
            oracle,
        }
    }

    pub fn from_config(config: &Config, workspace: &Path, oracle: &'a dyn RepairOracle) -> Self {
        Self::new(
            config.sweep_settings(),
            ResultStore::new(config.results_root(workspace), config.latest_strategy),
            BackupManager::new(config.backup_root(workspace)),
            oracle,
        )
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }
}

impl LoopSteps for InProcessSteps<'_> {
    fn sweep(&mut self, project_root: &Path) -> Result<()> {
        let results = sweep(project_root, &self.sweep)?;
        self.store
            .save(&paths::project_name(project_root), project_root, &results)?;
        Ok(())
    }

    fn latest_record(&mut self, project_name: &str) -> Result<Option<PathBuf>> {
        self.store.find_latest(project_name)
    }

    fn repair(&mut self, record: &Path) -> Result<()> {
        let record = ResultStore::load(record)?;
        RepairPass::new(self.oracle, self.backups.clone()).run(&record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<S> {
    config: LoopConfig,
    steps: S,
}

impl<S: LoopSteps> Orchestrator<S> {
    pub fn new(config: LoopConfig, steps: S) -> Self {
        Self { config, steps }
    }

    pub fn steps(&self) -> &S {
        &self.steps
    }

    /// Drive the loop for `project_root` until it reaches a terminal state.
    pub fn run(&mut self, project_root: &Path) -> LoopOutcome {
        if !project_root.is_dir() {
            let reason = format!("project path is not a directory: {}", project_root.display());
            error!("{reason}");
            return LoopOutcome {
                state: LoopState::Failure(reason),
                iterations: 0,
            };
        }
        if self.config.max_iterations == 0 {
            return LoopOutcome {
                state: LoopState::Exhausted,
                iterations: 0,
            };
        }

        let project_name = paths::project_name(project_root);
        info!("starting orchestration on {}", project_root.display());

        let mut iterations = 0;
        let mut state = LoopState::Running(1);
        while let LoopState::Running(n) = state {
            iterations = n;
            info!("iteration {n}/{}", self.config.max_iterations);
            state = self.iterate(n, project_root, &project_name);
        }

        match &state {
            LoopState::Success => info!("all units pass, orchestration finished"),
            LoopState::Exhausted => info!("maximum number of iterations reached"),
            LoopState::Failure(reason) => error!("orchestration stopped: {reason}"),
            LoopState::Running(_) => {}
        }
        LoopOutcome { state, iterations }
    }

    /// One iteration: returns the next state.
    fn iterate(&mut self, n: u32, project_root: &Path, project_name: &str) -> LoopState {
        if let Err(e) = self.steps.sweep(project_root) {
            return LoopState::Failure(format!("sweep failed: {e}"));
        }

        let record_path = match self.steps.latest_record(project_name) {
            Ok(Some(p)) => p,
            Ok(None) => {
                return LoopState::Failure(format!("no record found for project {project_name}"))
            }
            Err(e) => return LoopState::Failure(format!("could not locate record: {e}")),
        };
        info!("using record {}", record_path.display());

        let record = match ResultStore::load(&record_path) {
            Ok(r) => r,
            Err(e) => return LoopState::Failure(format!("could not read record: {e}")),
        };

        let failing: Vec<_> = record.results.failing().collect();
        if failing.is_empty() {
            return LoopState::Success;
        }
        for (key, outcome) in &failing {
            let stderr: String = outcome.stderr.trim().chars().take(100).collect();
            info!(
                "error detected in {key}: exit code {}, stderr: {stderr}",
                outcome.exit_code
            );
        }

        info!("{} failing unit(s), applying fixes", failing.len());
        if let Err(e) = self.steps.repair(&record_path) {
            return LoopState::Failure(format!("repair failed: {e}"));
        }

        if n >= self.config.max_iterations {
            return LoopState::Exhausted;
        }
        if !self.config.sleep_between.is_zero() {
            info!(
                "waiting {}ms before the next iteration",
                self.config.sleep_between.as_millis()
            );
            std::thread::sleep(self.config.sleep_between);
        }
        LoopState::Running(n + 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
