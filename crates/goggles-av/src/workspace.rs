//! Scratch space for intermediate render artifacts.
//!
//! A [`Workspace`] owns a temporary directory that is removed when the
//! workspace is dropped, whichever way the render that created it ends.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// Temporary directory for files that must not outlive a single render.
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a workspace in the system temp directory.
    pub fn new() -> Result<Self> {
        Self::new_in(None)
    }

    /// Create a workspace under `parent`, or the system temp directory if
    /// `None`. The parent is created if missing.
    pub fn new_in(parent: Option<&Path>) -> Result<Self> {
        let temp_dir = match parent {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tempfile::Builder::new().prefix("goggles-").tempdir_in(dir)
            }
            None => tempfile::Builder::new().prefix("goggles-").tempdir(),
        }
        .map_err(|e| Error::Workspace(format!("failed to create temp dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named temporary file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
