use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AutofixError;
use crate::process::run_captured;
use crate::record::ExecutionOutcome;

/// How a single unit is executed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// Interpreter program and leading arguments; the unit path is appended.
    pub interpreter: Vec<String>,
    pub timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            interpreter: vec!["python3".to_string()],
            timeout: Duration::from_secs(300),
        }
    }
}

/// Run one unit in its own process and capture what it produced.
///
/// Never fails: timeouts and launch errors are folded into the outcome with
/// exit code `-1`.
pub fn run_unit(unit: &Path, project_root: &Path, settings: &RunnerSettings) -> ExecutionOutcome {
    info!("running {}", unit.display());

    let Some((program, args)) = settings.interpreter.split_first() else {
        warn!("no interpreter configured, cannot run {}", unit.display());
        return ExecutionOutcome::launch_failure("no interpreter configured");
    };

    let mut cmd = Command::new(program);
    cmd.args(args).arg(unit).current_dir(project_root);

    match run_captured(cmd, settings.timeout) {
        Ok(out) => ExecutionOutcome::new(out.code.unwrap_or(-1), out.stdout, out.stderr),
        Err(AutofixError::ExecutionTimeout(t)) => {
            warn!("timeout after {}s running {}", t.as_secs(), unit.display());
            ExecutionOutcome::timed_out()
        }
        Err(e) => {
            warn!("could not run {}: {e}", unit.display());
            ExecutionOutcome::launch_failure(e.to_string())
        }
    }
}
