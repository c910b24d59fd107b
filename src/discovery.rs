//! Fixture discovery.
//!
//! Walks the whole tree below the discovery root and picks out fixture
//! directories: any directory whose name starts with three decimal digits
//! (`001-integer-addition`). Fixtures are grouped into suites by their parent
//! directory. Fixture directories are themselves walked, so a fixture nested
//! in another one is still found.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::fixture::{Fixture, Suite, ROOT_SUITE};

/// Returns true if `name` follows the `nnn-description` fixture convention.
pub fn is_fixture_name(name: &str) -> bool {
    let prefix: Vec<char> = name.chars().take(3).collect();
    prefix.len() == 3 && prefix.iter().all(char::is_ascii_digit)
}

/// Discovers fixture suites below a root directory.
pub struct Discovery {
    root: PathBuf,
}

impl Discovery {
    /// Creates a discovery rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a discovery rooted at the configured root.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Walks the tree and returns one suite per fixture parent directory.
    ///
    /// Suites are ordered by their parent's path relative to the root, so
    /// the root suite comes first. A tree without fixtures yields no suites.
    /// Any directory that cannot be read aborts discovery.
    pub fn discover(&self) -> Result<Vec<Suite>> {
        // Keyed by relative parent path: a top-level `root/` directory and the
        // root itself stay separate suites even though both are named "root".
        let mut groups: BTreeMap<PathBuf, Vec<Fixture>> = BTreeMap::new();
        self.walk(&self.root, &mut groups)?;

        let suites: Vec<Suite> = groups
            .into_iter()
            .map(|(parent, fixtures)| Suite::new(suite_name(&parent), fixtures))
            .collect();

        tracing::info!(
            root = ?self.root,
            suites = suites.len(),
            fixtures = suites.iter().map(Suite::len).sum::<usize>(),
            "discovered fixtures"
        );

        Ok(suites)
    }

    fn walk(&self, dir: &Path, groups: &mut BTreeMap<PathBuf, Vec<Fixture>>) -> Result<()> {
        let discovery_error = |source| Error::Discovery {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = std::fs::read_dir(dir)
            .map_err(discovery_error)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(discovery_error)?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_type = entry.file_type().map_err(discovery_error)?;
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if is_fixture_name(&name) {
                tracing::debug!(fixture = %name, "found fixture");
                let parent = dir.strip_prefix(&self.root).unwrap_or(dir).to_path_buf();
                groups
                    .entry(parent)
                    .or_default()
                    .push(Fixture::new(&path));
            }
            self.walk(&path, groups)?;
        }

        Ok(())
    }
}

/// Suite name for fixtures whose parent is `relative` to the root.
fn suite_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        ROOT_SUITE.to_string()
    } else {
        parts.join("/")
    }
}
