//! Subprocess invocation with captured output and a wall-clock timeout.
//!
//! Both the execution runner and the command oracle go through
//! [`run_captured`]. Stdout and stderr are drained on dedicated threads so a
//! chatty child never blocks on a full pipe, and the wait happens on a third
//! thread. A single deadline covers the exit of the child and the close of
//! both pipes, so a unit that leaves a background process holding its output
//! still stops at `timeout`.
//!
//! On unix the child leads its own process group and a timeout kills the
//! whole group.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{AutofixError, Result};

/// Output of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

enum Event {
    Stdout(String),
    Stderr(String),
    Exited(std::io::Result<ExitStatus>),
}

/// Run `cmd` with stdin closed and both output streams captured.
///
/// Returns `LaunchFailure` if the process cannot be spawned and
/// `ExecutionTimeout` if it has not exited and closed its output after
/// `timeout`, in which case the child (and its process group) is killed.
pub fn run_captured(mut cmd: Command, timeout: Duration) -> Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let start = Instant::now();
    let deadline = start + timeout;
    let mut child = cmd
        .spawn()
        .map_err(|e| AutofixError::LaunchFailure(format!("{:?}: {e}", cmd.get_program())))?;
    let child_pid = child.id();
    debug!(pid = child_pid, program = ?cmd.get_program(), "spawned");

    let (tx, rx) = mpsc::channel();
    spawn_reader(child.stdout.take(), tx.clone(), Event::Stdout);
    spawn_reader(child.stderr.take(), tx.clone(), Event::Stderr);
    std::thread::spawn(move || {
        let _ = tx.send(Event::Exited(child.wait()));
    });

    let mut stdout = None;
    let mut stderr = None;
    let mut status = None;
    while stdout.is_none() || stderr.is_none() || status.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(Event::Stdout(s)) => stdout = Some(s),
            Ok(Event::Stderr(s)) => stderr = Some(s),
            Ok(Event::Exited(r)) => {
                status = Some(
                    r.map_err(|e| AutofixError::LaunchFailure(format!("wait failed: {e}")))?,
                )
            }
            Err(RecvTimeoutError::Timeout) => {
                // Readers and waiter are abandoned; they finish once the
                // killed processes release the pipes.
                kill_process(child_pid);
                debug!(pid = child_pid, exited = status.is_some(), "killed after timeout");
                return Err(AutofixError::ExecutionTimeout(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AutofixError::LaunchFailure(
                    "lost track of child process".to_string(),
                ))
            }
        }
    }

    Ok(Captured {
        code: status.and_then(|s| s.code()),
        stdout: stdout.unwrap_or_default(),
        stderr: stderr.unwrap_or_default(),
        duration: start.elapsed(),
    })
}

fn spawn_reader<R>(handle: Option<R>, tx: Sender<Event>, wrap: fn(String) -> Event)
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = handle {
            let _ = r.read_to_end(&mut buf);
        }
        let _ = tx.send(wrap(String::from_utf8_lossy(&buf).into_owned()));
    });
}

/// Terminate the process group led by `pid`. Errors are ignored.
#[cfg(unix)]
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .args(["-9", "--", &format!("-{pid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(windows)]
fn kill_process(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams_and_code() {
        let out = run_captured(sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10)).unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
    }

    #[test]
    fn stdin_is_closed() {
        // `cat` with a null stdin sees EOF immediately instead of hanging.
        let out = run_captured(sh("cat"), Duration::from_secs(10)).unwrap();
        assert!(out.success());
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn timeout_kills_child() {
        let start = Instant::now();
        let err = run_captured(sh("sleep 60"), Duration::from_millis(150)).unwrap_err();
        assert!(matches!(err, AutofixError::ExecutionTimeout(_)));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn background_child_holding_pipes_still_times_out() {
        let start = Instant::now();
        let err = run_captured(sh("sleep 8 &\necho started"), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AutofixError::ExecutionTimeout(_)));
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "blocked for {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn missing_program_is_launch_failure() {
        let cmd = Command::new("definitely-not-a-real-binary-autofix");
        let err = run_captured(cmd, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, AutofixError::LaunchFailure(_)));
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let out = run_captured(
            sh("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done"),
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.lines().count(), 20000);
    }
}
