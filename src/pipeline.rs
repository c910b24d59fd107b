//! Build pipeline.
//!
//! Turns a fixture's source into a runnable program inside the fixture's
//! scratch directory: translate (compiler under test) → codegen → link.
//! Stages run strictly in order and the first failure ends the build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{HarnessConfig, ToolCommand, ToolchainConfig};
use crate::fixture::Fixture;
use crate::outcome::FailureReason;
use crate::process::{Invocation, ProcessOutcome};
use crate::scratch::ScratchDir;

/// Intermediate representation file name inside the scratch directory.
pub const IR_FILE: &str = "program.ll";

/// Object file name inside the scratch directory.
pub const OBJECT_FILE: &str = "program.o";

/// Executable file name inside the scratch directory.
pub const BINARY_FILE: &str = "program";

/// One step of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Compiler under test: source to IR.
    Translate,
    /// IR to native object file.
    Codegen,
    /// Object file to executable.
    Link,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Translate => "translate",
            Stage::Codegen => "codegen",
            Stage::Link => "link",
        };
        f.write_str(name)
    }
}

/// A built program, owning the scratch directory it lives in.
///
/// The scratch directory is deleted when the artifact is released or
/// dropped.
#[derive(Debug)]
pub struct BuildArtifact {
    scratch: ScratchDir,
    binary_path: PathBuf,
}

impl BuildArtifact {
    /// Wraps a binary that lives inside `scratch`.
    pub fn new(scratch: ScratchDir, binary_path: PathBuf) -> Self {
        Self {
            scratch,
            binary_path,
        }
    }

    /// The scratch directory holding all build outputs.
    pub fn scratch_directory(&self) -> &Path {
        self.scratch.path()
    }

    /// The runnable program.
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Deletes the scratch directory now.
    pub fn release(mut self) -> crate::error::Result<()> {
        self.scratch.cleanup()
    }
}

/// Builds fixtures into runnable programs.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Builds `fixture` inside `scratch`.
    ///
    /// On failure the scratch directory, with any partial outputs, is
    /// dropped before returning.
    async fn build(
        &self,
        fixture: &Fixture,
        scratch: ScratchDir,
    ) -> std::result::Result<BuildArtifact, FailureReason>;

    /// Returns the name of this pipeline.
    fn name(&self) -> &str;
}

/// Pipeline driving an external compiler, an LLVM-style code generator and
/// a C linker driver.
#[derive(Debug, Clone)]
pub struct ToolchainPipeline {
    toolchain: ToolchainConfig,
    stage_timeout: Duration,
}

impl ToolchainPipeline {
    /// Creates a pipeline for the given tools and per-stage time limit.
    pub fn new(toolchain: ToolchainConfig, stage_timeout: Duration) -> Self {
        Self {
            toolchain,
            stage_timeout,
        }
    }

    /// Creates a pipeline from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.toolchain.clone(), config.timeouts.stage_timeout())
    }

    /// Command line for `stage`, reading `input` and writing `output`.
    pub fn invocation(&self, stage: Stage, input: &Path, output: &Path) -> Invocation {
        match stage {
            Stage::Translate => tool(&self.toolchain.compiler)
                .arg(input)
                .arg("-o")
                .arg(output),
            Stage::Codegen => {
                let mut invocation = tool(&self.toolchain.codegen);
                if self.toolchain.pic {
                    invocation = invocation.arg("-relocation-model=pic");
                }
                invocation
                    .arg(input)
                    .arg("-filetype=obj")
                    .arg("-o")
                    .arg(output)
            }
            Stage::Link => tool(&self.toolchain.linker)
                .arg(input)
                .arg("-o")
                .arg(output),
        }
    }

    async fn run_stage(
        &self,
        fixture: &Fixture,
        stage: Stage,
        input: &Path,
        output: &Path,
    ) -> std::result::Result<(), FailureReason> {
        let invocation = self.invocation(stage, input, output);

        match invocation.run(self.stage_timeout).await {
            Ok(ProcessOutcome::Completed(result)) if result.exit.success() => {
                tracing::debug!(
                    fixture = %fixture.identifier(),
                    stage = %stage,
                    duration = ?result.duration,
                    "stage succeeded"
                );
                Ok(())
            }
            Ok(ProcessOutcome::Completed(result)) => {
                tracing::debug!(
                    fixture = %fixture.identifier(),
                    stage = %stage,
                    exit = %result.exit,
                    "stage failed"
                );
                Err(FailureReason::Build {
                    stage,
                    exit: Some(result.exit),
                    output: result.combined_output(),
                })
            }
            Ok(ProcessOutcome::TimedOut(after)) => {
                Err(FailureReason::BuildTimedOut { stage, after })
            }
            Err(e) => Err(FailureReason::Build {
                stage,
                exit: None,
                output: e.to_string(),
            }),
        }
    }
}

fn tool(command: &ToolCommand) -> Invocation {
    Invocation::new(&command.program).args(&command.args)
}

#[async_trait]
impl BuildPipeline for ToolchainPipeline {
    async fn build(
        &self,
        fixture: &Fixture,
        scratch: ScratchDir,
    ) -> std::result::Result<BuildArtifact, FailureReason> {
        let source = fixture.source_path();
        let ir = scratch.join(IR_FILE);
        let object = scratch.join(OBJECT_FILE);
        let binary = scratch.join(BINARY_FILE);

        self.run_stage(fixture, Stage::Translate, &source, &ir).await?;
        self.run_stage(fixture, Stage::Codegen, &ir, &object).await?;
        self.run_stage(fixture, Stage::Link, &object, &binary).await?;

        Ok(BuildArtifact::new(scratch, binary))
    }

    fn name(&self) -> &str {
        "toolchain"
    }
}
