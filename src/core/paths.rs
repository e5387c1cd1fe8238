//! core::paths
//!
//! Centralized path routing for guestbook storage locations.
//!
//! # Storage Layout
//!
//! Everything the persistence engine writes lives under one storage
//! directory:
//! - `LOCK` - Exclusive lock file held while an engine owns the directory
//! - `db.<seq>.partial` - Image being written (or left behind by a crash)
//! - `db.<seq>.FULL` - Complete, committed image
//!
//! **Hard rule:** no code outside this module joins file names onto the
//! storage directory. All paths go through `StoragePaths`.
//!
//! # Example
//!
//! ```
//! use guestbook::core::paths::StoragePaths;
//! use std::path::PathBuf;
//!
//! let paths = StoragePaths::new(PathBuf::from("/var/lib/guestbook"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/var/lib/guestbook/LOCK"));
//! ```

use std::path::{Path, PathBuf};

use crate::persist::image::{ImageId, ImageState};

/// Name of the lock file inside the storage directory.
pub const LOCK_FILE_NAME: &str = "LOCK";

/// Path routing for one storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create path routing rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default storage directory: `~/.guestbook/data`, or `./guestbook-data`
    /// when no home directory can be determined.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".guestbook").join("data"))
            .unwrap_or_else(|| PathBuf::from("guestbook-data"))
    }

    /// The storage directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the exclusive lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    /// Path of an image in the given state.
    pub fn image_path(&self, id: ImageId, state: ImageState) -> PathBuf {
        self.root.join(id.file_name(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_paths_live_under_root() {
        let paths = StoragePaths::new(PathBuf::from("/data"));
        let id = ImageId::new(42);

        assert_eq!(
            paths.image_path(id, ImageState::Complete),
            PathBuf::from("/data/db.00000000000000000042.FULL")
        );
        assert_eq!(
            paths.image_path(id, ImageState::Partial),
            PathBuf::from("/data/db.00000000000000000042.partial")
        );
    }

    #[test]
    fn default_root_is_not_empty() {
        assert!(StoragePaths::default_root().ends_with("data")
            || StoragePaths::default_root().ends_with("guestbook-data"));
    }
}
