//! End-to-end harness tests against a fake toolchain.
//!
//! Every tool is `/bin/sh` running a small script that copies its input to
//! the `-o` output, refusing sources that contain `BUILD_FAIL`. Fixture
//! sources are shell scripts, so the "built" program is the source itself.
//!
//! Run with: `cargo test --test harness_integration`

#![cfg(unix)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use validation_harness::{
    Discovery, ExitState, FailureReason, Harness, HarnessConfig, RunReport, Stage, TimeoutConfig,
    ToolCommand, ToolchainConfig,
};

const FAKE_TOOL: &str = r#"
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -*) shift ;;
    *) in="$1"; shift ;;
  esac
done
if grep -q BUILD_FAIL "$in"; then
  echo "$in: error: refusing to build" >&2
  exit 1
fi
cp "$in" "$out" && chmod +x "$out"
"#;

fn fake_tool() -> ToolCommand {
    ToolCommand::new("/bin/sh").with_args(["-c", FAKE_TOOL, "fake-tool"])
}

/// Validation tree plus a separate scratch parent.
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir(temp.path().join("validation")).expect("failed to create root");
        Self { temp }
    }

    fn root(&self) -> PathBuf {
        self.temp.path().join("validation")
    }

    fn scratch(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    /// Adds a fixture whose program is the given shell body.
    fn fixture(&self, rel: &str, body: &str) -> PathBuf {
        let dir = self.root().join(rel);
        std::fs::create_dir_all(&dir).expect("failed to create fixture dir");
        std::fs::write(dir.join("main.c"), format!("#!/bin/sh\n{}\n", body))
            .expect("failed to write main.c");
        dir
    }

    fn expect(&self, fixture: &Path, file: &str, content: &str) {
        std::fs::write(fixture.join(file), content).expect("failed to write expectation");
    }

    fn config(&self, jobs: usize) -> HarnessConfig {
        HarnessConfig::new(self.root())
            .with_toolchain(ToolchainConfig {
                compiler: fake_tool(),
                codegen: fake_tool(),
                linker: fake_tool(),
                pic: true,
            })
            .with_timeouts(TimeoutConfig {
                stage_secs: 10,
                run_secs: 2,
            })
            .with_scratch_dir(self.scratch())
            .with_jobs(jobs)
    }

    async fn run(&self, jobs: usize) -> RunReport {
        let config = self.config(jobs);
        let suites = Discovery::from_config(&config)
            .discover()
            .expect("discovery failed");
        Harness::new(config).run(&suites).await
    }

    fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.scratch()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn reasons<'a>(report: &'a RunReport, suite: &str, id: &str) -> &'a [FailureReason] {
    report
        .suites
        .iter()
        .find(|s| s.name == suite)
        .and_then(|s| s.results.iter().find(|r| r.identifier == id))
        .map(|r| r.outcome.reasons())
        .unwrap_or_else(|| panic!("no result for {}/{}", suite, id))
}

#[tokio::test]
async fn mixed_run_reports_each_fixture() {
    let ws = Workspace::new();
    ws.fixture("arithmetic/001-silent-success", "exit 0");
    let exit_one = ws.fixture("arithmetic/002-exit-one", "exit 1");
    ws.expect(&exit_one, "exit.expected", "1\n");
    let no_newline = ws.fixture("arithmetic/003-missing-newline", "printf 42");
    ws.expect(&no_newline, "stdout.expected", "42\n");
    ws.fixture("control-flow/001-broken", "# BUILD_FAIL");
    let after = ws.fixture("control-flow/002-after-broken", "echo done");
    ws.expect(&after, "stdout.expected", "done\n");

    let report = ws.run(4).await;

    assert_eq!(report.suites.len(), 2);
    assert_eq!(report.total(), 5);
    assert!(reasons(&report, "arithmetic", "001-silent-success").is_empty());
    assert!(reasons(&report, "arithmetic", "002-exit-one").is_empty());
    assert_eq!(
        reasons(&report, "arithmetic", "003-missing-newline"),
        &[FailureReason::StdoutMismatch {
            expected: "42\n".to_string(),
            actual: "42".to_string(),
        }]
    );

    match reasons(&report, "control-flow", "001-broken") {
        [FailureReason::Build {
            stage,
            exit,
            output,
        }] => {
            assert_eq!(*stage, Stage::Translate);
            assert_eq!(*exit, Some(ExitState::Code(1)));
            assert!(output.contains("refusing to build"), "output: {}", output);
        }
        other => panic!("unexpected reasons: {:?}", other),
    }
    assert!(reasons(&report, "control-flow", "002-after-broken").is_empty());

    assert!(!report.passed());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(ws.scratch_entries(), 0);
}

#[tokio::test]
async fn all_passing_run_exits_zero() {
    let ws = Workspace::new();
    let hello = ws.fixture("demos/001-hello", "echo hello");
    ws.expect(&hello, "stdout.expected", "hello\n");
    let status = ws.fixture("demos/002-status", "exit 7");
    ws.expect(&status, "exit.expected", "7");
    ws.fixture("003-top-level", "true");

    let report = ws.run(1).await;

    let names: Vec<&str> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["root", "demos"]);
    assert!(report.passed(), "{}", report.render());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(ws.scratch_entries(), 0);
}

#[tokio::test]
async fn empty_tree_runs_nothing_and_passes() {
    let ws = Workspace::new();
    std::fs::create_dir(ws.root().join("pointers")).unwrap();

    let report = ws.run(2).await;

    assert!(report.suites.is_empty());
    assert!(report.passed());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn hanging_program_is_killed_and_reported() {
    let ws = Workspace::new();
    ws.fixture("loops/001-forever", "exec sleep 30");
    ws.fixture("loops/002-fine", "exit 0");

    let report = ws.run(2).await;

    assert!(matches!(
        reasons(&report, "loops", "001-forever"),
        [FailureReason::TimedOut { .. }]
    ));
    assert!(reasons(&report, "loops", "002-fine").is_empty());
    assert_eq!(ws.scratch_entries(), 0);
}

#[tokio::test]
async fn crashing_program_reports_signal() {
    let ws = Workspace::new();
    ws.fixture("pointers/001-segfault", "kill -SEGV $$");

    let report = ws.run(1).await;

    assert_eq!(
        reasons(&report, "pointers", "001-segfault"),
        &[FailureReason::ExitCodeMismatch {
            expected: 0,
            actual: ExitState::Signal(11),
        }]
    );
}

#[tokio::test]
async fn program_stderr_is_captured_as_diagnostics() {
    let ws = Workspace::new();
    ws.fixture("io/001-noisy", "echo 'assertion failed' >&2; exit 2");

    let report = ws.run(1).await;

    let result = &report.suites[0].results[0];
    assert!(!result.passed());
    assert_eq!(result.diagnostics, "assertion failed\n");
    assert!(report.render().contains("      | assertion failed"));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let ws = Workspace::new();
    ws.fixture("a/001-pass", "exit 0");
    let fail = ws.fixture("a/002-fail", "echo wrong");
    ws.expect(&fail, "stdout.expected", "right\n");
    ws.fixture("b/001-broken", "BUILD_FAIL");

    let first = ws.run(3).await;
    let second = ws.run(3).await;

    let summarize = |report: &RunReport| {
        report
            .suites
            .iter()
            .flat_map(|s| s.results.iter())
            .map(|r| (r.suite.clone(), r.identifier.clone(), r.passed(), r.outcome.reasons().len()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&first), summarize(&second));
    assert_eq!(first.exit_code(), second.exit_code());
    assert_eq!(ws.scratch_entries(), 0);
}

#[tokio::test]
async fn missing_compiler_fails_every_fixture_without_aborting() {
    let ws = Workspace::new();
    ws.fixture("a/001-x", "exit 0");
    ws.fixture("a/002-y", "exit 0");

    let config = ws
        .config(2)
        .with_compiler(ToolCommand::new(ws.root().join("../bin/cc")));
    let suites = Discovery::from_config(&config).discover().unwrap();
    let report = Harness::new(config).run(&suites).await;

    assert_eq!(report.total(), 2);
    for result in &report.suites[0].results {
        assert!(matches!(
            result.outcome.reasons(),
            [FailureReason::Build {
                stage: Stage::Translate,
                exit: None,
                ..
            }]
        ));
    }
}
