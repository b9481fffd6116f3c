//! Subprocess execution with enforced timeouts.
//!
//! Runs a materialized command as a single `sh -c` invocation with the
//! parameter environment attached, a configurable working directory, and
//! a hard wall-clock timeout. Stdout and stderr are captured and returned
//! together with the exit code, including on failure, so callers can
//! diagnose what went wrong.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::template::Materialized;

/// Default wall-clock timeout when a tool does not declare one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default working directory when none is configured.
pub const DEFAULT_WORKDIR: &str = "/tmp";

/// Exit code reported when the child never produced a real one
/// (timeout, spawn failure, or death by signal).
pub const EXIT_CODE_NONE: i32 = -1;

/// A completed, successful execution.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Combined stdout and stderr.
    pub output: String,
    /// Child exit code (0 here; non-zero exits are errors).
    pub exit_code: i32,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
}

/// Why an execution failed.
#[derive(Debug, thiserror::Error)]
pub enum ExecErrorKind {
    #[error("command failed with exit code {0}")]
    NonZeroExit(i32),

    #[error("command timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A failed execution. Captured output is preserved so the caller can
/// surface it; it is never discarded.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct ExecError {
    pub kind: ExecErrorKind,
    /// Whatever combined output was captured before the failure.
    pub output: String,
    /// Child exit code, or [`EXIT_CODE_NONE`].
    pub exit_code: i32,
    pub duration: Duration,
}

/// Execute a materialized command.
///
/// The parameter environment is attached on top of the inherited
/// environment; the indirection variables always win over inherited
/// variables of the same name. When the timeout expires the child is
/// killed and the error is distinguishable from a non-zero exit.
pub fn run(
    materialized: &Materialized,
    timeout: Duration,
    workdir: Option<&Path>,
) -> Result<Execution, ExecError> {
    let start = Instant::now();

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&materialized.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(workdir.unwrap_or_else(|| Path::new(DEFAULT_WORKDIR)));
    for (name, value) in &materialized.env {
        command.env(name, value);
    }

    let mut child = command.spawn().map_err(|e| ExecError {
        kind: ExecErrorKind::Spawn(e),
        output: String::new(),
        exit_code: EXIT_CODE_NONE,
        duration: start.elapsed(),
    })?;

    // Drain both pipes on their own threads so a chatty child cannot
    // deadlock against a full pipe buffer while we wait on it.
    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");
    let stdout_reader = thread::spawn(move || read_all(stdout));
    let stderr_reader = thread::spawn(move || read_all(stderr));

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            // Timed out: kill the child, then collect whatever was
            // written before the kill.
            let _ = child.kill();
            let _ = child.wait();
            let output = join_output(stdout_reader, stderr_reader);
            tracing::warn!(timeout_secs = timeout.as_secs(), "command timed out");
            return Err(ExecError {
                kind: ExecErrorKind::TimedOut(timeout),
                output,
                exit_code: EXIT_CODE_NONE,
                duration: start.elapsed(),
            });
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            let output = join_output(stdout_reader, stderr_reader);
            return Err(ExecError {
                kind: ExecErrorKind::Spawn(e),
                output,
                exit_code: EXIT_CODE_NONE,
                duration: start.elapsed(),
            });
        }
    };

    let output = join_output(stdout_reader, stderr_reader);
    let duration = start.elapsed();
    let exit_code = status.code().unwrap_or(EXIT_CODE_NONE);

    if exit_code != 0 {
        return Err(ExecError {
            kind: ExecErrorKind::NonZeroExit(exit_code),
            output,
            exit_code,
            duration,
        });
    }

    Ok(Execution {
        output,
        exit_code,
        duration,
    })
}

fn read_all(mut source: impl Read) -> String {
    let mut buf = String::new();
    let _ = source.read_to_string(&mut buf);
    buf
}

fn join_output(
    stdout_reader: thread::JoinHandle<String>,
    stderr_reader: thread::JoinHandle<String>,
) -> String {
    let mut output = stdout_reader.join().unwrap_or_default();
    output.push_str(&stderr_reader.join().unwrap_or_default());
    output
}
