//! Client for the external code-repair oracle.
//!
//! The oracle is any command that takes one instruction text as its final
//! argument and prints a corrected script on stdout, e.g.
//! `ollama run llama3:latest <prompt>`. Callers go through the
//! [`RepairOracle`] trait so the loop can run against a test double.

use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::OracleConfig;
use crate::error::AutofixError;
use crate::process::run_captured;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("oracle exited with {}: {stderr}", exit_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("could not launch oracle: {0}")]
    Launch(String),

    #[error("oracle returned an empty response")]
    EmptyResponse,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

/// Something that proposes a corrected version of a failing script.
pub trait RepairOracle {
    /// Return the full replacement content for `content` given the failure
    /// output `error`. The answer may still carry markdown wrapping.
    fn request_fix(&self, content: &str, error: &str) -> Result<String, OracleError>;
}

/// Build the instruction text sent to the oracle.
pub fn build_prompt(content: &str, error: &str) -> String {
    format!(
        "The following script fails when run. Analyse the script and the error, \
then produce a complete corrected version.\n\
\n\
Script:\n\
\"\"\"\n\
{content}\n\
\"\"\"\n\
\n\
Error:\n\
\"\"\"\n\
{error}\n\
\"\"\"\n\
\n\
Reply with **only** the corrected code, without markdown fences or explanations.\n"
    )
}

// ---------------------------------------------------------------------------
// CommandOracle
// ---------------------------------------------------------------------------

/// Oracle backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(config.command.clone(), config.timeout())
    }
}

impl RepairOracle for CommandOracle {
    fn request_fix(&self, content: &str, error: &str) -> Result<String, OracleError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| OracleError::Launch("oracle command is empty".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(build_prompt(content, error));

        let out = match run_captured(cmd, self.timeout) {
            Ok(out) => out,
            Err(AutofixError::ExecutionTimeout(t)) => return Err(OracleError::Timeout(t)),
            Err(e) => return Err(OracleError::Launch(e.to_string())),
        };
        debug!(code = ?out.code, elapsed_ms = out.duration.as_millis() as u64, "oracle finished");

        if !out.success() {
            return Err(OracleError::Failed {
                code: out.code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        let answer = out.stdout.trim();
        if answer.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandOracle {
        CommandOracle::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[test]
    fn prompt_embeds_both_inputs() {
        let prompt = build_prompt("print(x)", "NameError: name 'x' is not defined");
        assert!(prompt.contains("print(x)"));
        assert!(prompt.contains("NameError"));
        assert!(prompt.find("print(x)").unwrap() < prompt.find("NameError").unwrap());
    }

    #[test]
    fn prompt_is_passed_as_last_argument() {
        // With `sh -c script`, the next argument becomes $0.
        let oracle = sh("printf '%s' \"$0\"", Duration::from_secs(10));
        let answer = oracle.request_fix("echo broken", "exit 1").unwrap();
        assert!(answer.contains("echo broken"));
        assert!(answer.contains("exit 1"));
    }

    #[test]
    fn trims_answer() {
        let oracle = sh("printf '\\n  fixed  \\n'", Duration::from_secs(10));
        assert_eq!(oracle.request_fix("a", "b").unwrap(), "fixed");
    }

    #[test]
    fn non_zero_exit_is_failure() {
        let oracle = sh("echo model missing >&2; exit 2", Duration::from_secs(10));
        match oracle.request_fix("a", "b") {
            Err(OracleError::Failed { code, stderr }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "model missing");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn timeout_is_reported() {
        let oracle = sh("sleep 30", Duration::from_millis(150));
        assert!(matches!(
            oracle.request_fix("a", "b"),
            Err(OracleError::Timeout(_))
        ));
    }

    #[test]
    fn empty_output_is_absent() {
        let oracle = sh("true", Duration::from_secs(10));
        assert!(matches!(
            oracle.request_fix("a", "b"),
            Err(OracleError::EmptyResponse)
        ));
    }

    #[test]
    fn missing_program_and_empty_command() {
        let oracle = CommandOracle::new(
            vec!["no-such-oracle-autofix".to_string()],
            Duration::from_secs(5),
        );
        assert!(matches!(
            oracle.request_fix("a", "b"),
            Err(OracleError::Launch(_))
        ));
        let empty = CommandOracle::new(vec![], Duration::from_secs(5));
        assert!(matches!(
            empty.request_fix("a", "b"),
            Err(OracleError::Launch(_))
        ));
    }
}
