//! Validation harness CLI
//!
//! Discovers every fixture below the validation root, runs them all and
//! exits with 0 if every fixture passed, 1 otherwise.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use validation_harness::{Discovery, Harness, HarnessConfig, Validate};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 2 || args.iter().skip(1).any(|a| a.starts_with('-')) {
        eprintln!("Usage: {} [validation-root]", args[0]);
        eprintln!("\nBuilds and runs every fixture below the validation root (default: current directory).");
        eprintln!("\nEnvironment variables:");
        eprintln!("  HARNESS_COMPILER=<path>  Compiler under test (default: <root>/../bin/cc)");
        eprintln!("  HARNESS_JOBS=<n>         Fixtures run in parallel (default: available cores)");
        eprintln!("  HARNESS_REPORT=<path>    Also write a JSON report");
        std::process::exit(1);
    }

    let root = match args.get(1) {
        Some(root) => PathBuf::from(root),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Failed to determine current directory: {}", e);
                std::process::exit(1);
            }
        },
    };

    match run(root).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Validation run failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn run(root: PathBuf) -> validation_harness::Result<i32> {
    let config = HarnessConfig::load(root)?;
    for warning in config.validate().into_result()? {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        root = ?config.root,
        compiler = ?config.toolchain.compiler.program,
        "starting validation"
    );

    let suites = Discovery::from_config(&config).discover()?;
    let report_path = config.report_path.clone();
    let harness = Harness::new(config);

    let report = harness.run(&suites).await;
    print!("{}", report.render());

    if let Some(path) = report_path {
        report.write_json(&path)?;
    }

    Ok(report.exit_code())
}
