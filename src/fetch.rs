//! Populating the staging directory.
//!
//! Fetching is opaque to the pipeline: a [`SourceFetcher`] only has to leave files in the
//! staging directory before discovery starts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::FetchError;

/// Fills the staging directory with source files.
pub trait SourceFetcher {
    /// Populate `staging_dir`, creating it if needed. Returns the number of files delivered.
    fn fetch(&self, staging_dir: &Path) -> Result<usize, FetchError>;
}

/// Leaves the staging directory as is (files were dropped there by another process).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFetcher;

impl SourceFetcher for NoopFetcher {
    fn fetch(&self, staging_dir: &Path) -> Result<usize, FetchError> {
        fs::create_dir_all(staging_dir)?;
        Ok(0)
    }
}

/// Copies every regular file of a drop folder into the staging directory.
///
/// Files already staged under the same name are overwritten, so a re-delivered file replaces the
/// previous copy. Symlinks to regular files are copied by content; subdirectories are ignored.
/// A drop folder that resolves to the staging directory is rejected, since copying a file onto
/// itself truncates it.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    source: PathBuf,
}

impl DirectoryFetcher {
    /// Fetch from `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl SourceFetcher for DirectoryFetcher {
    fn fetch(&self, staging_dir: &Path) -> Result<usize, FetchError> {
        if !self.source.is_dir() {
            return Err(FetchError::SourceNotFound(self.source.clone()));
        }
        fs::create_dir_all(staging_dir)?;

        let source = fs::canonicalize(&self.source)?;
        if source == fs::canonicalize(staging_dir)? {
            return Err(FetchError::SourceIsStaging(self.source.clone()));
        }

        let mut copied = 0;
        for entry in WalkDir::new(&source).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !is_regular_file(&entry) {
                continue;
            }
            let target = staging_dir.join(entry.file_name());
            if target.exists() && fs::canonicalize(entry.path())? == fs::canonicalize(&target)? {
                debug!(file = %target.display(), "already staged in place");
                continue;
            }
            fs::copy(entry.path(), &target)?;
            debug!(file = %target.display(), "staged");
            copied += 1;
        }

        info!(source = %self.source.display(), files = copied, "fetched source files");
        Ok(copied)
    }
}

/// Regular files, and symlinks that resolve to one. Broken links are not files.
pub(crate) fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}
