//! persist::lock
//!
//! Exclusive ownership of a storage directory.
//!
//! # Architecture
//!
//! The storage lock ensures only one persistence engine writes a storage
//! directory at a time, whether the competitor is another engine in the same
//! process or a second guestbook process pointed at the same path.
//!
//! # Invariants
//!
//! - Lock is held for the whole lifetime of a `PersistenceEngine`
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use guestbook::core::paths::StoragePaths;
//! use guestbook::persist::lock::StorageLock;
//! use std::path::PathBuf;
//!
//! let paths = StoragePaths::new(PathBuf::from("/var/lib/guestbook"));
//! let lock = StorageLock::acquire(&paths)?;
//! println!("locked {}", lock.path().display());
//! // Lock released when `lock` goes out of scope
//! # Ok::<(), guestbook::persist::lock::LockError>(())
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StoragePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another engine already holds the lock.
    #[error("storage directory is locked by another guestbook engine")]
    AlreadyLocked,

    /// Failed to create or open the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on a storage directory.
///
/// The lock is released when this guard is dropped, even on panic.
#[derive(Debug)]
pub struct StorageLock {
    /// Path to the lock file.
    path: PathBuf,
    /// Open handle carrying the OS lock.
    file: File,
}

impl StorageLock {
    /// Attempt to acquire the storage lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// The storage directory must already exist.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another engine holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be opened
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &StoragePaths) -> Result<Self, LockError> {
        let path = paths.lock_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        // fs2 locks are per open file description, so this also refuses a
        // second engine inside the same process.
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { path, file }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::AlreadyLocked)
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        // Best-effort release; closing the handle releases it anyway
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> StoragePaths {
        StoragePaths::new(dir.to_path_buf())
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock = StorageLock::acquire(&paths).expect("acquire lock");
        assert!(lock.path().exists());
        assert_eq!(lock.path(), paths.lock_path());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let _lock = StorageLock::acquire(&paths).expect("first acquire");
        let result = StorageLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        {
            let _lock = StorageLock::acquire(&paths).expect("first acquire");
        }

        StorageLock::acquire(&paths).expect("second acquire");
    }

    #[test]
    fn missing_directory_fails_to_create() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp.path().join("does-not-exist"));

        let result = StorageLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::CreateFailed(_))));
    }

    #[test]
    fn error_display_formatting() {
        assert!(LockError::AlreadyLocked.to_string().contains("locked"));
        assert!(LockError::CreateFailed("x".into())
            .to_string()
            .contains("create"));
        assert!(LockError::AcquireFailed("x".into())
            .to_string()
            .contains("acquire"));
    }
}
