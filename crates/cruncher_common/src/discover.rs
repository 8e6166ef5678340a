//! Recursive log-file discovery.
//!
//! Upgrade logs arrive as per-host directory trees dropped under one root;
//! a scan walks the whole tree and picks out files by name pattern. The
//! walk is lazy so a scan can start emitting paths before the tree has been
//! fully enumerated.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::CruncherError;

/// Finds files matching a glob pattern anywhere under a root directory.
pub struct FileLocator {
    matcher: GlobMatcher,
}

impl FileLocator {
    /// Compile a glob pattern (e.g. `setupact.log`,
    /// `*.4.0.1_APPRAISER_HumanReadable.xml`). The pattern is matched
    /// against file names, not full paths.
    pub fn new(pattern: &str) -> Result<Self, CruncherError> {
        Ok(Self {
            matcher: Glob::new(pattern)?.compile_matcher(),
        })
    }

    /// Lazily yield every matching file under `root`, recursively.
    ///
    /// A missing root is not an error: nothing is yielded. Unreadable
    /// directory entries are skipped with a warning and the walk continues.
    pub fn find(&self, root: &Path) -> impl Iterator<Item = PathBuf> {
        let walker = if root.is_dir() {
            Some(WalkDir::new(root).into_iter())
        } else {
            warn!("directory does not exist: {}", root.display());
            None
        };

        let matcher = self.matcher.clone();
        walker
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(move |entry| matcher.is_match(entry.file_name()))
            .map(|entry| {
                debug!("found file: {}", entry.path().display());
                entry.into_path()
            })
    }
}
