//! Fixture and suite value types.
//!
//! A fixture is a directory holding `main.c` and, optionally,
//! `exit.expected` and `stdout.expected`. Expectations are read from those
//! files on demand and never derived from the program under test.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

/// Source file every fixture is built from.
pub const SOURCE_FILE: &str = "main.c";

/// Optional expected exit code, as a text integer.
pub const EXIT_EXPECTED_FILE: &str = "exit.expected";

/// Optional expected standard output, compared byte for byte.
pub const STDOUT_EXPECTED_FILE: &str = "stdout.expected";

/// Suite name used for fixtures that sit directly in the discovery root.
pub const ROOT_SUITE: &str = "root";

/// One discovered test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fixture {
    identifier: String,
    directory: PathBuf,
}

impl Fixture {
    /// Creates a fixture for `directory`; the identifier is its file name.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let identifier = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            identifier,
            directory,
        }
    }

    /// Stable fixture name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Directory holding the source and expectation files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the program source.
    pub fn source_path(&self) -> PathBuf {
        self.directory.join(SOURCE_FILE)
    }

    /// Expected exit code; `0` when `exit.expected` is absent.
    ///
    /// Surrounding whitespace is ignored so a trailing newline is harmless.
    pub fn expected_exit_code(&self) -> Result<i32> {
        let path = self.directory.join(EXIT_EXPECTED_FILE);
        match read_optional(&path)? {
            None => Ok(0),
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.trim().parse().map_err(|e| Error::InvalidExpectation {
                    path,
                    reason: format!("expected an integer, found {:?} ({})", text.trim(), e),
                })
            }
        }
    }

    /// Expected standard output as raw bytes; empty when `stdout.expected`
    /// is absent.
    pub fn expected_stdout(&self) -> Result<Vec<u8>> {
        let path = self.directory.join(STDOUT_EXPECTED_FILE);
        Ok(read_optional(&path)?.unwrap_or_default())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::InvalidExpectation {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// A named group of fixtures sharing a parent directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suite {
    name: String,
    fixtures: Vec<Fixture>,
}

impl Suite {
    /// Creates a suite; fixtures are put in identifier order.
    pub fn new(name: impl Into<String>, mut fixtures: Vec<Fixture>) -> Self {
        fixtures.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Self {
            name: name.into(),
            fixtures,
        }
    }

    /// Suite name, the parent directory relative to the discovery root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixtures in run order.
    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// Number of fixtures.
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Whether the suite has no fixtures.
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}
