use anyhow::Context;
use autofix_core::{
    config::Config,
    oracle::CommandOracle,
    orchestrator::{InProcessSteps, LoopConfig, LoopOutcome, LoopState, LoopSteps, Orchestrator},
    store::ResultStore,
    AutofixError,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::output::print_json;

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit for a loop that did not succeed
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    Exhausted { iterations: u32 },
    Failed { reason: String, iterations: u32 },
}

impl RunExit {
    /// `None` when the loop succeeded.
    fn from_outcome(outcome: &LoopOutcome) -> Option<Self> {
        let iterations = outcome.iterations;
        match &outcome.state {
            LoopState::Success => None,
            LoopState::Exhausted => Some(RunExit::Exhausted { iterations }),
            other => Some(RunExit::Failed {
                reason: other.to_string(),
                iterations,
            }),
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::Exhausted { iterations } => write!(
                f,
                "scripts still failing after {iterations} iteration(s)"
            ),
            RunExit::Failed { reason, iterations } => {
                write!(f, "orchestration failed at iteration {iterations}: {reason}")
            }
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// SubprocessSteps: each pass as a separate `autofix` invocation
// ---------------------------------------------------------------------------

/// Runs `autofix exec` and `autofix fix` as child processes of this binary.
/// A non-zero exit of either is a pass-level failure.
struct SubprocessSteps {
    exe: PathBuf,
    workspace: PathBuf,
    store: ResultStore,
    quiet: bool,
}

impl SubprocessSteps {
    fn new(workspace: &Path, config: &Config, quiet: bool) -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("cannot locate the autofix executable")?;
        tracing::debug!(binary = %exe.display(), "isolated mode");
        Ok(Self {
            exe,
            workspace: workspace.to_path_buf(),
            store: ResultStore::new(config.results_root(workspace), config.latest_strategy),
            quiet,
        })
    }

    fn invoke(&self, args: &[&OsStr]) -> autofix_core::Result<()> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("--workspace")
            .arg(&self.workspace)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        if self.quiet {
            cmd.stdout(Stdio::null());
        }

        let status = cmd
            .status()
            .map_err(|e| AutofixError::LaunchFailure(format!("{}: {e}", self.exe.display())))?;
        if !status.success() {
            let sub = args
                .first()
                .map(|a| a.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(AutofixError::LaunchFailure(format!(
                "`autofix {sub}` exited with {status}"
            )));
        }
        Ok(())
    }
}

impl LoopSteps for SubprocessSteps {
    fn sweep(&mut self, project_root: &Path) -> autofix_core::Result<()> {
        self.invoke(&[OsStr::new("exec"), OsStr::new("-p"), project_root.as_os_str()])
    }

    fn latest_record(&mut self, project_name: &str) -> autofix_core::Result<Option<PathBuf>> {
        self.store.find_latest(project_name)
    }

    fn repair(&mut self, record: &Path) -> autofix_core::Result<()> {
        self.invoke(&[OsStr::new("fix"), record.as_os_str()])
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(
    workspace: &Path,
    project: &Path,
    max_iterations: Option<u32>,
    isolated: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(workspace).context("failed to load config")?;
    let mut loop_config = config.loop_config();
    if let Some(n) = max_iterations {
        loop_config.max_iterations = n;
    }

    // A path that cannot be resolved is reported by the loop itself.
    let project_root = project
        .canonicalize()
        .unwrap_or_else(|_| project.to_path_buf());

    let outcome = if isolated {
        let steps = SubprocessSteps::new(workspace, &config, json)?;
        drive(loop_config, steps, &project_root)
    } else {
        let oracle = CommandOracle::from_config(&config.oracle);
        let steps = InProcessSteps::from_config(&config, workspace, &oracle);
        drive(loop_config, steps, &project_root)
    };

    if json {
        print_json(&outcome)?;
    } else if outcome.succeeded() {
        println!(
            "All scripts pass after {} iteration(s).",
            outcome.iterations
        );
    }

    match RunExit::from_outcome(&outcome) {
        None => Ok(()),
        Some(exit) => Err(exit.into()),
    }
}

fn drive<S: LoopSteps>(config: LoopConfig, steps: S, project_root: &Path) -> LoopOutcome {
    Orchestrator::new(config, steps).run(project_root)
}
