//! Execution and assertion.
//!
//! Runs a built program with no arguments and closed stdin, then checks its
//! exit code and standard output against the fixture's expectations. Both
//! checks are always made, so a run can fail for both reasons at once.

use std::time::Duration;

use crate::config::HarnessConfig;
use crate::fixture::Fixture;
use crate::outcome::{FailureReason, Outcome};
use crate::pipeline::BuildArtifact;
use crate::process::{ExitState, Invocation, ProcessOutcome, ProcessOutput};

/// What running one artifact produced.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Pass, or every mismatch found.
    pub outcome: Outcome,
    /// The program's standard error.
    pub stderr: String,
}

/// Runs artifacts and judges them.
#[derive(Debug, Clone)]
pub struct Executor {
    run_timeout: Duration,
}

impl Executor {
    /// Creates an executor that kills programs running longer than `run_timeout`.
    pub fn new(run_timeout: Duration) -> Self {
        Self { run_timeout }
    }

    /// Creates an executor from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.timeouts.run_timeout())
    }

    /// Runs `artifact` and compares it with `fixture`'s expectations.
    pub async fn execute(&self, artifact: &BuildArtifact, fixture: &Fixture) -> Execution {
        let invocation = Invocation::new(artifact.binary_path());

        let output = match invocation.run(self.run_timeout).await {
            Ok(ProcessOutcome::Completed(output)) => output,
            Ok(ProcessOutcome::TimedOut(after)) => {
                return Execution {
                    outcome: Outcome::Failed(vec![FailureReason::TimedOut { after }]),
                    stderr: String::new(),
                };
            }
            Err(e) => {
                return Execution {
                    outcome: Outcome::Failed(vec![FailureReason::Launch {
                        message: e.to_string(),
                    }]),
                    stderr: String::new(),
                };
            }
        };

        tracing::debug!(
            fixture = %fixture.identifier(),
            exit = %output.exit,
            duration = ?output.duration,
            "program finished"
        );

        Execution {
            outcome: Outcome::from_failures(check(fixture, &output)),
            stderr: output.stderr_text(),
        }
    }
}

/// Checks a finished program against the fixture's expectation files.
///
/// An unreadable expectation is reported in place of that check; the other
/// check still runs.
pub fn check(fixture: &Fixture, output: &ProcessOutput) -> Vec<FailureReason> {
    let mut failures = Vec::new();

    match fixture.expected_exit_code() {
        Ok(expected) => failures.extend(check_exit(expected, output.exit)),
        Err(e) => failures.push(FailureReason::InvalidExpectation {
            message: e.to_string(),
        }),
    }

    match fixture.expected_stdout() {
        Ok(expected) => failures.extend(check_stdout(&expected, &output.stdout)),
        Err(e) => failures.push(FailureReason::InvalidExpectation {
            message: e.to_string(),
        }),
    }

    failures
}

/// Exact exit code comparison; a signal never matches.
pub fn check_exit(expected: i32, actual: ExitState) -> Option<FailureReason> {
    if actual.code() == Some(expected) {
        None
    } else {
        Some(FailureReason::ExitCodeMismatch { expected, actual })
    }
}

/// Byte-exact comparison, no trimming or newline normalization.
///
/// Both sides are decoded only for the mismatch report.
pub fn check_stdout(expected: &[u8], actual: &[u8]) -> Option<FailureReason> {
    if expected == actual {
        None
    } else {
        Some(FailureReason::StdoutMismatch {
            expected: String::from_utf8_lossy(expected).into_owned(),
            actual: String::from_utf8_lossy(actual).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{EXIT_EXPECTED_FILE, STDOUT_EXPECTED_FILE};
    use tempfile::TempDir;

    fn output(exit: ExitState, stdout: &str) -> ProcessOutput {
        ProcessOutput {
            exit,
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    fn fixture(temp: &TempDir, exit: Option<&str>, stdout: Option<&str>) -> Fixture {
        let dir = temp.path().join("001-case");
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(exit) = exit {
            std::fs::write(dir.join(EXIT_EXPECTED_FILE), exit).unwrap();
        }
        if let Some(stdout) = stdout {
            std::fs::write(dir.join(STDOUT_EXPECTED_FILE), stdout).unwrap();
        }
        Fixture::new(dir)
    }

    #[test]
    fn silent_zero_exit_passes_without_expectation_files() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, None, None);

        assert!(check(&fixture, &output(ExitState::Code(0), "")).is_empty());
    }

    #[test]
    fn expected_exit_code_is_honoured() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, Some("1\n"), None);

        assert!(check(&fixture, &output(ExitState::Code(1), "")).is_empty());
        assert_eq!(
            check(&fixture, &output(ExitState::Code(0), "")),
            vec![FailureReason::ExitCodeMismatch {
                expected: 1,
                actual: ExitState::Code(0),
            }]
        );
    }

    #[test]
    fn unexpected_stdout_fails_when_none_expected() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, Some("1"), None);

        let failures = check(&fixture, &output(ExitState::Code(1), "noise"));
        assert_eq!(
            failures,
            vec![FailureReason::StdoutMismatch {
                expected: String::new(),
                actual: "noise".to_string(),
            }]
        );
    }

    #[test]
    fn missing_trailing_newline_is_a_stdout_mismatch() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, None, Some("42\n"));

        let failures = check(&fixture, &output(ExitState::Code(0), "42"));
        assert_eq!(
            failures,
            vec![FailureReason::StdoutMismatch {
                expected: "42\n".to_string(),
                actual: "42".to_string(),
            }]
        );
    }

    #[test]
    fn both_mismatches_are_reported() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, Some("3"), Some("a\n"));

        let failures = check(&fixture, &output(ExitState::Code(0), "b\n"));
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0], FailureReason::ExitCodeMismatch { .. }));
        assert!(matches!(failures[1], FailureReason::StdoutMismatch { .. }));
    }

    #[test]
    fn stdout_is_compared_as_raw_bytes() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, None, None);
        std::fs::write(fixture.directory().join(STDOUT_EXPECTED_FILE), [0xfe, b'\n']).unwrap();

        let mut wrong = output(ExitState::Code(0), "");
        wrong.stdout = vec![0xff, b'\n'];
        let failures = check(&fixture, &wrong);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], FailureReason::StdoutMismatch { .. }));

        let mut right = output(ExitState::Code(0), "");
        right.stdout = vec![0xfe, b'\n'];
        assert!(check(&fixture, &right).is_empty());
    }

    #[test]
    fn signal_never_matches_exit_code() {
        assert!(check_exit(0, ExitState::Signal(11)).is_some());
        assert!(check_exit(139, ExitState::Signal(11)).is_some());
        assert!(check_exit(0, ExitState::Unknown).is_some());
    }

    #[test]
    fn malformed_exit_expectation_still_checks_stdout() {
        let temp = TempDir::new().unwrap();
        let fixture = fixture(&temp, Some("zero"), Some("ok\n"));

        let failures = check(&fixture, &output(ExitState::Code(0), "ok\n"));
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], FailureReason::InvalidExpectation { .. }));
    }
}
