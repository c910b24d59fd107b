//! Validation harness - end-to-end correctness checks for a compiler toolchain.
//!
//! Discovers fixture directories, builds each fixture's `main.c` through the
//! external toolchain (compiler under test, code generator, linker), runs the
//! result and checks its exit code and standard output against expectations.

pub mod config;
pub mod discovery;
pub mod error;
pub mod execute;
pub mod fixture;
pub mod harness;
pub mod outcome;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod scratch;

pub use config::{HarnessConfig, TimeoutConfig, ToolCommand, ToolchainConfig, Validate};
pub use discovery::Discovery;
pub use error::{Error, Result};
pub use execute::Executor;
pub use fixture::{Fixture, Suite};
pub use harness::Harness;
pub use outcome::{FailureReason, FixtureResult, Outcome};
pub use pipeline::{BuildArtifact, BuildPipeline, Stage, ToolchainPipeline};
pub use process::ExitState;
pub use report::{RunReport, SuiteReport};
pub use scratch::ScratchDir;
