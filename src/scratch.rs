//! Per-fixture scratch directories.
//!
//! Every fixture run gets a freshly created directory for its intermediate
//! and final build artifacts. The directory is removed when the
//! [`ScratchDir`] is cleaned up or dropped, whichever comes first.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A scratch directory exclusively owned by one fixture run.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleaned_up: bool,
}

impl ScratchDir {
    /// Creates a new, empty scratch directory below `base`.
    ///
    /// Resulting directory name: `{label}-{short_uuid}`, with `label`
    /// sanitized for use in a path. Creation fails rather than reuse an
    /// existing directory.
    pub fn create(base: &Path, label: &str) -> Result<Self> {
        let short_uuid = &uuid::Uuid::new_v4().simple().to_string()[..12];
        let sanitized: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .to_lowercase();
        let path = base.join(format!("{}-{}", sanitized, short_uuid));

        std::fs::create_dir_all(base).map_err(|source| Error::Scratch {
            path: base.to_path_buf(),
            source,
        })?;
        std::fs::create_dir(&path).map_err(|source| Error::Scratch {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = ?path, "created scratch directory");

        Ok(Self {
            path,
            cleaned_up: false,
        })
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a path for `name` inside the directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Recursively deletes the directory.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        tracing::debug!(path = ?self.path, "removed scratch directory");
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.cleanup() {
                tracing::warn!(error = %e, path = ?self.path, "failed to remove scratch directory on drop");
            }
        }
    }
}
