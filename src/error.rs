//! Error types for the validation harness.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error outside of a more specific context.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The fixture tree could not be enumerated.
    #[error("failed to discover fixtures under {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A scratch directory could not be created.
    #[error("failed to create scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An expectation file exists but cannot be used.
    #[error("invalid expectation in {path}: {reason}")]
    InvalidExpectation { path: PathBuf, reason: String },

    /// The run report could not be written.
    #[error("failed to write report: {0}")]
    Report(String),
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
