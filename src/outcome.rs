//! Fixture run results.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::pipeline::Stage;
use crate::process::ExitState;

/// Why a fixture failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The scratch directory could not be set up.
    Setup { message: String },

    /// An expectation file could not be read or parsed.
    InvalidExpectation { message: String },

    /// A build stage exited unsuccessfully or could not be started.
    Build {
        stage: Stage,
        /// `None` when the tool never started.
        exit: Option<ExitState>,
        /// The tool's combined output, or the spawn error.
        output: String,
    },

    /// A build stage was killed at its time limit.
    BuildTimedOut { stage: Stage, after: Duration },

    /// The built program could not be started.
    Launch { message: String },

    /// The program ran but exited differently than expected.
    ExitCodeMismatch { expected: i32, actual: ExitState },

    /// The program's standard output differs from the expectation.
    StdoutMismatch { expected: String, actual: String },

    /// The program was killed at its time limit.
    TimedOut { after: Duration },

    /// The fixture's task ended without producing a result.
    Aborted { message: String },

    /// The scratch directory could not be removed after the run.
    Cleanup { message: String },
}

impl FailureReason {
    /// One-line summary without the expected/actual payload.
    pub fn summary(&self) -> String {
        match self {
            FailureReason::Setup { .. } => "setup failed".to_string(),
            FailureReason::InvalidExpectation { .. } => "invalid expectation".to_string(),
            FailureReason::Build { stage, exit, .. } => match exit {
                Some(exit) => format!("{} stage failed ({})", stage, exit),
                None => format!("{} stage could not start", stage),
            },
            FailureReason::BuildTimedOut { stage, after } => {
                format!("{} stage timed out after {:?}", stage, after)
            }
            FailureReason::Launch { .. } => "program could not start".to_string(),
            FailureReason::ExitCodeMismatch { .. } => "exit code mismatch".to_string(),
            FailureReason::StdoutMismatch { .. } => "stdout mismatch".to_string(),
            FailureReason::TimedOut { after } => format!("program timed out after {:?}", after),
            FailureReason::Aborted { .. } => "run aborted".to_string(),
            FailureReason::Cleanup { .. } => "scratch cleanup failed".to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Setup { message }
            | FailureReason::InvalidExpectation { message }
            | FailureReason::Launch { message }
            | FailureReason::Aborted { message }
            | FailureReason::Cleanup { message } => write!(f, "{}: {}", self.summary(), message),
            FailureReason::ExitCodeMismatch { expected, actual } => write!(
                f,
                "{}: expected exit code {}, got {}",
                self.summary(),
                expected,
                actual
            ),
            FailureReason::StdoutMismatch { expected, actual } => write!(
                f,
                "{}: expected {:?}, got {:?}",
                self.summary(),
                expected,
                actual
            ),
            _ => write!(f, "{}", self.summary()),
        }
    }
}

/// Pass or fail, with every reason found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reasons", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(Vec<FailureReason>),
}

impl Outcome {
    /// Builds an outcome from collected failures; no failures is a pass.
    pub fn from_failures(failures: Vec<FailureReason>) -> Self {
        if failures.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed(failures)
        }
    }

    /// Adds one more failure reason, turning a pass into a failure.
    pub fn with_failure(self, reason: FailureReason) -> Self {
        match self {
            Outcome::Passed => Outcome::Failed(vec![reason]),
            Outcome::Failed(mut reasons) => {
                reasons.push(reason);
                Outcome::Failed(reasons)
            }
        }
    }

    /// Returns true for a pass.
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Failure reasons; empty for a pass.
    pub fn reasons(&self) -> &[FailureReason] {
        match self {
            Outcome::Passed => &[],
            Outcome::Failed(reasons) => reasons,
        }
    }
}

/// Result of one fixture's build-execute-assert cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureResult {
    /// Suite the fixture belongs to.
    pub suite: String,
    /// Fixture identifier.
    pub identifier: String,
    /// Verdict.
    pub outcome: Outcome,
    /// Wall-clock time for the whole cycle.
    pub duration: Duration,
    /// Standard error of the program under test, if it ran.
    pub diagnostics: String,
}

impl FixtureResult {
    /// Returns true if the fixture passed.
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}
