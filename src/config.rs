//! Harness configuration.
//!
//! A single [`HarnessConfig`] is built once per run and shared read-only by
//! the aggregator and the build pipeline. Values come from defaults, an
//! optional `harness.toml` in the discovery root, and a few environment
//! variables, in that order of precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the optional configuration file looked up in the discovery root.
pub const CONFIG_FILE: &str = "harness.toml";

/// Environment variable overriding the compiler under test.
pub const ENV_COMPILER: &str = "HARNESS_COMPILER";

/// Environment variable overriding the worker-pool size.
pub const ENV_JOBS: &str = "HARNESS_JOBS";

/// Environment variable enabling the JSON report.
pub const ENV_REPORT: &str = "HARNESS_REPORT";

/// An external tool: a program plus arguments placed before the stage's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ToolSpec", into = "ToolSpec")]
pub struct ToolCommand {
    /// Program to execute.
    pub program: PathBuf,
    /// Leading arguments.
    pub args: Vec<String>,
}

/// On-disk form of a tool: either a bare program or a table.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ToolSpec {
    Program(PathBuf),
    Full {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl From<ToolSpec> for ToolCommand {
    fn from(raw: ToolSpec) -> Self {
        match raw {
            ToolSpec::Program(program) => Self::new(program),
            ToolSpec::Full { program, args } => Self { program, args },
        }
    }
}

impl From<ToolCommand> for ToolSpec {
    fn from(tool: ToolCommand) -> Self {
        if tool.args.is_empty() {
            ToolSpec::Program(tool.program)
        } else {
            ToolSpec::Full {
                program: tool.program,
                args: tool.args,
            }
        }
    }
}

impl ToolCommand {
    /// Creates a tool with no leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Sets the leading arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Anchors a relative program path at `base`.
    ///
    /// Bare names such as `llc` are left alone so they are looked up on
    /// `PATH`; only paths with a directory component are rewritten.
    fn anchored_at(mut self, base: &Path) -> Self {
        let has_dir = self.program.components().count() > 1;
        if self.program.is_relative() && has_dir {
            self.program = base.join(&self.program);
        }
        self
    }
}

/// The external tools that make up the build pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Compiler under test (translate stage).
    #[serde(default = "default_compiler")]
    pub compiler: ToolCommand,

    /// Native code generator (codegen stage).
    #[serde(default = "default_codegen")]
    pub codegen: ToolCommand,

    /// Linker (link stage).
    #[serde(default = "default_linker")]
    pub linker: ToolCommand,

    /// Emit position-independent code during codegen.
    #[serde(default = "default_pic")]
    pub pic: bool,
}

fn default_compiler() -> ToolCommand {
    ToolCommand::new("../bin/cc")
}

fn default_codegen() -> ToolCommand {
    ToolCommand::new("llc")
}

fn default_linker() -> ToolCommand {
    ToolCommand::new("clang")
}

fn default_pic() -> bool {
    true
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            codegen: default_codegen(),
            linker: default_linker(),
            pic: default_pic(),
        }
    }
}

/// Upper bounds on external process run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Limit for each build stage, in seconds.
    #[serde(default = "default_stage_secs")]
    pub stage_secs: u64,

    /// Limit for the program under test, in seconds.
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

fn default_stage_secs() -> u64 {
    60
}

fn default_run_secs() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            stage_secs: default_stage_secs(),
            run_secs: default_run_secs(),
        }
    }
}

impl TimeoutConfig {
    /// Returns the build stage limit as a Duration.
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_secs)
    }

    /// Returns the execution limit as a Duration.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

/// Run-scoped harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Discovery root. Not read from the config file, which lives inside it.
    #[serde(skip)]
    pub root: PathBuf,

    /// External toolchain.
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Process time limits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Maximum number of fixtures in flight.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Parent directory for scratch directories (system temp dir if unset).
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Where to write the JSON report, if anywhere.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl HarnessConfig {
    /// Creates a default configuration for the given discovery root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            root: root.into(),
            toolchain: ToolchainConfig::default(),
            timeouts: TimeoutConfig::default(),
            jobs: default_jobs(),
            scratch_dir: None,
            report_path: None,
        };
        config.anchor_paths();
        config
    }

    /// Loads the configuration for `root`: defaults, then `harness.toml`
    /// if present, then environment overrides.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let file = root.join(CONFIG_FILE);

        let config = if file.is_file() {
            let content = std::fs::read_to_string(&file)?;
            tracing::debug!(path = ?file, "loading harness config");
            Self::from_toml_str(root, &content)?
        } else {
            Self::new(root)
        };

        config.with_env(|key| std::env::var(key).ok())
    }

    /// Parses a TOML configuration for the given root.
    pub fn from_toml_str(root: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", CONFIG_FILE, e)))?;
        config.root = root.into();
        config.anchor_paths();
        Ok(config)
    }

    /// Applies environment overrides using the given lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(compiler) = lookup(ENV_COMPILER) {
            self.toolchain.compiler = ToolCommand::new(compiler).anchored_at(&self.root);
        }

        if let Some(jobs) = lookup(ENV_JOBS) {
            self.jobs = jobs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{} must be an integer: {}", ENV_JOBS, e)))?;
        }

        if let Some(report) = lookup(ENV_REPORT) {
            self.report_path = Some(PathBuf::from(report));
        }

        Ok(self)
    }

    /// Sets the compiler under test.
    pub fn with_compiler(mut self, compiler: ToolCommand) -> Self {
        self.toolchain.compiler = compiler;
        self
    }

    /// Sets the whole toolchain.
    pub fn with_toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Sets the process time limits.
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the worker-pool size.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the scratch parent directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Directory under which scratch directories are created.
    pub fn scratch_base(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn anchor_paths(&mut self) {
        let root = self.root.clone();
        let toolchain = &mut self.toolchain;
        toolchain.compiler = toolchain.compiler.clone().anchored_at(&root);
        toolchain.codegen = toolchain.codegen.clone().anchored_at(&root);
        toolchain.linker = toolchain.linker.clone().anchored_at(&root);
        if let Some(dir) = self.scratch_dir.take() {
            self.scratch_dir = Some(if dir.is_relative() { root.join(dir) } else { dir });
        }
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

impl Validate for TimeoutConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.stage_secs == 0 {
            result.add_error("timeouts.stage_secs must be at least 1");
        }
        if self.run_secs == 0 {
            result.add_error("timeouts.run_secs must be at least 1");
        }

        result
    }
}

impl Validate for HarnessConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = self.timeouts.validate();

        if self.jobs == 0 {
            result.add_error("jobs must be at least 1");
        }

        if !self.root.is_dir() {
            result.add_error(format!(
                "discovery root {} is not a directory",
                self.root.display()
            ));
        }

        // Bare names resolve through PATH at spawn time.
        let compiler = &self.toolchain.compiler.program;
        if compiler.components().count() > 1 && !compiler.exists() {
            result.add_warning(format!(
                "compiler {} does not exist; every fixture will fail to build",
                compiler.display()
            ));
        }

        result
    }
}
