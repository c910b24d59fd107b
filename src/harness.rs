//! Suite aggregator.
//!
//! Runs every fixture through scratch setup → build → execute and assert →
//! scratch release. Fixtures are independent tasks on a worker pool bounded
//! by `jobs`; their results come back over a channel and are put back into
//! discovery order before reporting.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};

use crate::config::HarnessConfig;
use crate::execute::Executor;
use crate::fixture::{Fixture, Suite};
use crate::outcome::{FailureReason, FixtureResult, Outcome};
use crate::pipeline::{BuildPipeline, ToolchainPipeline};
use crate::report::{RunReport, SuiteReport};
use crate::scratch::ScratchDir;

/// A finished fixture, tagged with its position in discovery order.
struct Completed {
    suite_index: usize,
    fixture_index: usize,
    result: FixtureResult,
}

/// Runs suites of fixtures and aggregates their results.
#[derive(Clone)]
pub struct Harness {
    config: Arc<HarnessConfig>,
    pipeline: Arc<dyn BuildPipeline>,
    executor: Executor,
}

impl Harness {
    /// Creates a harness that builds with the configured toolchain.
    pub fn new(config: HarnessConfig) -> Self {
        let pipeline = Arc::new(ToolchainPipeline::from_config(&config));
        Self::with_pipeline(config, pipeline)
    }

    /// Creates a harness with a custom build pipeline.
    pub fn with_pipeline(config: HarnessConfig, pipeline: Arc<dyn BuildPipeline>) -> Self {
        let executor = Executor::from_config(&config);
        Self {
            config: Arc::new(config),
            pipeline,
            executor,
        }
    }

    /// Runs one fixture's full cycle.
    ///
    /// Never fails: setup, build and assertion problems all become a failed
    /// [`FixtureResult`]. The scratch directory is gone when this returns.
    pub async fn run_fixture(&self, suite: &str, fixture: &Fixture) -> FixtureResult {
        let start = Instant::now();
        let label = format!("{}-{}", suite, fixture.identifier());

        let (outcome, diagnostics) =
            match ScratchDir::create(&self.config.scratch_base(), &label) {
                Err(e) => (
                    Outcome::Failed(vec![FailureReason::Setup {
                        message: e.to_string(),
                    }]),
                    String::new(),
                ),
                Ok(scratch) => match self.pipeline.build(fixture, scratch).await {
                    Err(reason) => (Outcome::Failed(vec![reason]), String::new()),
                    Ok(artifact) => {
                        let execution = self.executor.execute(&artifact, fixture).await;
                        let mut outcome = execution.outcome;
                        if let Err(e) = artifact.release() {
                            tracing::warn!(
                                fixture = %fixture.identifier(),
                                error = %e,
                                "failed to remove scratch directory"
                            );
                            outcome = outcome.with_failure(FailureReason::Cleanup {
                                message: e.to_string(),
                            });
                        }
                        (outcome, execution.stderr)
                    }
                },
            };

        FixtureResult {
            suite: suite.to_string(),
            identifier: fixture.identifier().to_string(),
            outcome,
            duration: start.elapsed(),
            diagnostics,
        }
    }

    /// Runs every fixture of every suite and returns the ordered report.
    pub async fn run(&self, suites: &[Suite]) -> RunReport {
        let start = Instant::now();
        let total: usize = suites.iter().map(Suite::len).sum();
        let jobs = self.config.jobs.max(1);

        tracing::info!(
            suites = suites.len(),
            fixtures = total,
            jobs,
            pipeline = self.pipeline.name(),
            "starting run"
        );

        let semaphore = Arc::new(Semaphore::new(jobs));
        let (tx, mut rx) = mpsc::channel::<Completed>(total.max(1));

        for (suite_index, suite) in suites.iter().enumerate() {
            for (fixture_index, fixture) in suite.fixtures().iter().enumerate() {
                let harness = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let tx = tx.clone();
                let suite_name = suite.name().to_string();
                let fixture = fixture.clone();

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let result = harness.run_fixture(&suite_name, &fixture).await;
                    let completed = Completed {
                        suite_index,
                        fixture_index,
                        result,
                    };
                    if tx.send(completed).await.is_err() {
                        tracing::warn!("result receiver dropped");
                    }
                });
            }
        }
        drop(tx);

        let mut remaining: Vec<usize> = suites.iter().map(Suite::len).collect();
        let mut slots: Vec<Vec<Option<FixtureResult>>> =
            suites.iter().map(|s| vec![None; s.len()]).collect();

        while let Some(completed) = rx.recv().await {
            let result = completed.result;
            if result.passed() {
                tracing::info!(suite = %result.suite, fixture = %result.identifier, "passed");
            } else {
                let reasons: Vec<String> =
                    result.outcome.reasons().iter().map(|r| r.summary()).collect();
                tracing::info!(
                    suite = %result.suite,
                    fixture = %result.identifier,
                    reasons = %reasons.join("; "),
                    "failed"
                );
            }

            slots[completed.suite_index][completed.fixture_index] = Some(result);
            remaining[completed.suite_index] -= 1;
            if remaining[completed.suite_index] == 0 {
                let suite = &slots[completed.suite_index];
                let failed = suite
                    .iter()
                    .flatten()
                    .filter(|r| !r.passed())
                    .count();
                tracing::info!(
                    suite = %suites[completed.suite_index].name(),
                    passed = suite.len() - failed,
                    failed,
                    "suite finished"
                );
            }
        }

        let reports = suites
            .iter()
            .zip(slots)
            .map(|(suite, results)| {
                let results = suite
                    .fixtures()
                    .iter()
                    .zip(results)
                    .map(|(fixture, result)| {
                        result.unwrap_or_else(|| aborted(suite.name(), fixture))
                    })
                    .collect();
                SuiteReport::new(suite.name(), results)
            })
            .collect();

        let report = RunReport::new(reports, start.elapsed());
        tracing::info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            duration = ?report.duration,
            "run finished"
        );
        report
    }
}

/// Result for a fixture whose task ended without reporting back.
fn aborted(suite: &str, fixture: &Fixture) -> FixtureResult {
    FixtureResult {
        suite: suite.to_string(),
        identifier: fixture.identifier().to_string(),
        outcome: Outcome::Failed(vec![FailureReason::Aborted {
            message: "fixture task ended without a result".to_string(),
        }]),
        duration: std::time::Duration::ZERO,
        diagnostics: String::new(),
    }
}
