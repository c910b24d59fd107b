//! External process invocation.
//!
//! Every tool the harness runs, and the program under test itself, goes
//! through [`Invocation::run`]: stdin is closed, stdout and stderr are
//! captured, and the process is killed if it outlives its time limit.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;

use crate::error::{Error, Result};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitState {
    /// Normal exit with a status code.
    Code(i32),
    /// Terminated by a signal.
    Signal(i32),
    /// Neither a code nor a signal was reported.
    Unknown,
}

impl ExitState {
    /// Returns the exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitState::Code(code) => Some(*code),
            _ => None,
        }
    }

    /// Returns true for a zero exit code.
    pub fn success(&self) -> bool {
        self.code() == Some(0)
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitState::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitState::Signal(signal);
            }
        }

        ExitState::Unknown
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit code {}", code),
            ExitState::Signal(signal) => write!(f, "terminated by signal {}", signal),
            ExitState::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// How the process ended.
    pub exit: ExitState,
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Raw standard error.
    pub stderr: Vec<u8>,
    /// Wall-clock run time.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Standard output decoded as text (invalid UTF-8 is replaced).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded as text (invalid UTF-8 is replaced).
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Standard output followed by standard error.
    pub fn combined_output(&self) -> String {
        let mut combined = self.stdout_text();
        if !combined.is_empty() && !combined.ends_with('\n') && !self.stderr.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&self.stderr_text());
        combined
    }
}

/// Result of running a process under a time limit.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// The process exited (with any status) before the limit.
    Completed(ProcessOutput),
    /// The process was killed after running for the given limit.
    TimedOut(Duration),
}

/// A command line to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the command, killing it if it has not exited within `limit`.
    ///
    /// Returns `Err` only when the process cannot be started or waited on;
    /// a non-zero exit is a normal [`ProcessOutcome::Completed`].
    pub async fn run(&self, limit: Duration) -> Result<ProcessOutcome> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self, timeout = ?limit, "running process");

        let start = Instant::now();
        let child = command.spawn().map_err(|source| Error::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutcome::Completed(ProcessOutput {
                exit: output.status.into(),
                stdout: output.stdout,
                stderr: output.stderr,
                duration: start.elapsed(),
            })),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => {
                tracing::warn!(command = %self, timeout = ?limit, "process timed out, killed");
                Ok(ProcessOutcome::TimedOut(limit))
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
