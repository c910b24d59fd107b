//! Run reporting.
//!
//! Suite and run summaries, the plain-text report printed at the end of a
//! run, and the optional JSON report.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::outcome::{FailureReason, FixtureResult};

/// Results of one suite, in fixture order.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Suite name.
    pub name: String,
    /// Per-fixture results.
    pub results: Vec<FixtureResult>,
}

impl SuiteReport {
    /// Creates a suite report.
    pub fn new(name: impl Into<String>, results: Vec<FixtureResult>) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }

    /// True when every fixture passed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(FixtureResult::passed)
    }

    /// Number of passing fixtures.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of failing fixtures.
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }
}

/// Results of a whole run, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Per-suite reports.
    pub suites: Vec<SuiteReport>,
    /// Wall-clock time for the run.
    pub duration: Duration,
}

/// JSON document written to the report path.
#[derive(Serialize)]
struct JsonReport<'a> {
    passed: bool,
    total: usize,
    failed: usize,
    duration_ms: u128,
    suites: &'a [SuiteReport],
}

impl RunReport {
    /// Creates a run report.
    pub fn new(suites: Vec<SuiteReport>, duration: Duration) -> Self {
        Self { suites, duration }
    }

    /// The verdict: every fixture in every suite passed.
    pub fn passed(&self) -> bool {
        self.suites
            .iter()
            .fold(true, |all_passed, suite| all_passed && suite.passed())
    }

    /// Process exit status for the verdict.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    /// Number of fixtures run.
    pub fn total(&self) -> usize {
        self.suites.iter().map(|s| s.results.len()).sum()
    }

    /// Number of passing fixtures.
    pub fn passed_count(&self) -> usize {
        self.suites.iter().map(SuiteReport::passed_count).sum()
    }

    /// Number of failing fixtures.
    pub fn failed_count(&self) -> usize {
        self.total() - self.passed_count()
    }

    /// Renders the human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for suite in &self.suites {
            let _ = writeln!(out, "== {}", suite.name);
            for result in &suite.results {
                render_result(&mut out, result);
            }
            let _ = writeln!(
                out,
                "-- {}: {} passed, {} failed",
                suite.name,
                suite.passed_count(),
                suite.failed_count()
            );
            out.push('\n');
        }

        let _ = writeln!(
            out,
            "== {} passed, {} failed in {} {} ({:.2?}): {}",
            self.passed_count(),
            self.failed_count(),
            self.suites.len(),
            if self.suites.len() == 1 { "suite" } else { "suites" },
            self.duration,
            if self.passed() { "OK" } else { "FAILED" }
        );

        out
    }

    /// Writes the JSON report to `path`.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let document = JsonReport {
            passed: self.passed(),
            total: self.total(),
            failed: self.failed_count(),
            duration_ms: self.duration.as_millis(),
            suites: &self.suites,
        };

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::Report(format!("failed to serialize report: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| Error::Report(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = ?path, "wrote JSON report");
        Ok(())
    }
}

fn render_result(out: &mut String, result: &FixtureResult) {
    if result.passed() {
        let _ = writeln!(out, "ok    {} ({:.2?})", result.identifier, result.duration);
        return;
    }

    let _ = writeln!(out, "FAIL  {} ({:.2?})", result.identifier, result.duration);
    for reason in result.outcome.reasons() {
        let _ = writeln!(out, "      {}", reason);
        if let FailureReason::Build { output, .. } = reason {
            indent(out, output);
        }
    }
    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "      stderr:");
        indent(out, &result.diagnostics);
    }
}

fn indent(out: &mut String, text: &str) {
    for line in text.lines() {
        let _ = writeln!(out, "      | {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;
    use crate::pipeline::Stage;
    use crate::process::ExitState;
    use tempfile::TempDir;

    fn result(id: &str, outcome: Outcome) -> FixtureResult {
        FixtureResult {
            suite: "s".to_string(),
            identifier: id.to_string(),
            outcome,
            duration: Duration::from_millis(5),
            diagnostics: String::new(),
        }
    }

    fn mixed_report() -> RunReport {
        RunReport::new(
            vec![
                SuiteReport::new("arithmetic", vec![result("001-add", Outcome::Passed)]),
                SuiteReport::new(
                    "pointers",
                    vec![
                        result("001-addr", Outcome::Passed),
                        result(
                            "002-deref",
                            Outcome::Failed(vec![FailureReason::Build {
                                stage: Stage::Translate,
                                exit: Some(ExitState::Code(1)),
                                output: "main.c:3: error: expected ';'\n".to_string(),
                            }]),
                        ),
                    ],
                ),
            ],
            Duration::from_secs(1),
        )
    }

    #[test]
    fn verdict_is_and_of_suites() {
        let report = mixed_report();

        assert!(report.suites[0].passed());
        assert!(!report.suites[1].passed());
        assert!(!report.passed());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn all_passing_run_exits_zero() {
        let report = RunReport::new(
            vec![SuiteReport::new("root", vec![result("001-x", Outcome::Passed)])],
            Duration::ZERO,
        );
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn render_lists_failures_with_diagnostics() {
        let text = mixed_report().render();

        assert!(text.contains("== arithmetic\nok    001-add"));
        assert!(text.contains("FAIL  002-deref"));
        assert!(text.contains("translate stage failed (exit code 1)"));
        assert!(text.contains("      | main.c:3: error: expected ';'"));
        assert!(text.contains("-- pointers: 1 passed, 1 failed"));
        assert!(text.contains("== 2 passed, 1 failed in 2 suites"));
        assert!(text.trim_end().ends_with("FAILED"));
    }

    #[test]
    fn render_shows_program_stderr_on_failure() {
        let mut failed = result(
            "003-crash",
            Outcome::Failed(vec![FailureReason::ExitCodeMismatch {
                expected: 0,
                actual: ExitState::Signal(11),
            }]),
        );
        failed.diagnostics = "segfault here\n".to_string();
        let report = RunReport::new(vec![SuiteReport::new("s", vec![failed])], Duration::ZERO);

        let text = report.render();

        assert!(text.contains("expected exit code 0, got terminated by signal 11"));
        assert!(text.contains("      stderr:\n      | segfault here"));
    }

    #[test]
    fn json_report_round_trips_key_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.json");

        mixed_report().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["total"], 3);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["suites"][1]["name"], "pointers");
        assert_eq!(
            value["suites"][1]["results"][1]["outcome"]["reasons"][0]["stage"],
            "translate"
        );
    }

    #[test]
    fn json_report_to_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let err = mixed_report()
            .write_json(&temp.path().join("missing").join("report.json"))
            .unwrap_err();
        assert!(matches!(err, Error::Report(_)));
    }
}
