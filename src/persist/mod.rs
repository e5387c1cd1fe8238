//! persist
//!
//! Durable snapshots of the guest registry.
//!
//! # Modules
//!
//! - [`image`] - Image identity and `db.<seq>.<state>` file naming
//! - [`codec`] - Line-oriented record format
//! - [`lock`] - Exclusive ownership of the storage directory
//! - [`engine`] - Crash-safe write protocol and latest-image recovery
//! - [`flusher`] - Background task flushing snapshots on an interval
//!
//! # Crash Safety Contract
//!
//! 1. A new image is written under a fresh `partial` name, synced and closed.
//! 2. Only then is it renamed to its `FULL` name. The rename is atomic, so a
//!    reader sees either no image or a complete one.
//! 3. Earlier complete images are never touched, so a crash at any point
//!    leaves the previous image as the latest recoverable state.

pub mod codec;
pub mod engine;
pub mod flusher;
pub mod image;
pub mod lock;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::registry::Snapshot;

pub use engine::{ImageReader, PersistenceEngine};
pub use flusher::{FlushReport, Flusher};
pub use image::{ImageId, ImageInfo, ImageState};
pub use lock::{LockError, StorageLock};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading, writing, syncing or renaming an image failed.
    #[error("storage i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The selected image could not be decoded.
    #[error("corrupt image '{path}' at line {line}: {reason}")]
    CorruptImage {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The storage directory is unusable.
    #[error("storage directory misconfigured: {0}")]
    Configuration(String),

    /// Another engine owns the storage directory.
    #[error("storage directory '{path}' is owned by another engine")]
    Locked { path: PathBuf },

    /// Every sequence number up to `u64::MAX` is already taken.
    #[error("image sequence exhausted")]
    SequenceExhausted,

    /// The commit target already holds a complete image.
    #[error("refusing to overwrite existing image '{path}'")]
    ImageExists { path: PathBuf },

    /// The blocking task running a persist panicked or was cancelled.
    #[error("persist task failed: {0}")]
    TaskFailed(String),

    /// A guest name cannot be written in the record format.
    #[error("guest name {name:?} contains a line break and cannot be persisted")]
    Unencodable { name: String },
}

impl PersistError {
    /// Whether the failure may go away on the next flush attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistError::Io { .. })
    }
}

/// What `load_latest` does when the newest complete image is corrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Fail startup with the decode error.
    #[default]
    Strict,
    /// Warn and fall back to the next-older complete image.
    Fallback,
}

/// Destination for registry snapshots.
///
/// The flusher only talks to this trait, which keeps the loop independent of
/// the on-disk layout.
pub trait SnapshotStore: Send + Sync {
    /// Durably store `snapshot` as a new image.
    fn persist(&self, snapshot: &Snapshot) -> Result<ImageId, PersistError>;
}

/// Fault injection for testing crash recovery.
///
/// Only available in test builds or with the `fault_injection` feature.
/// State is thread-local so parallel tests do not interfere.
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    thread_local! {
        /// Crash on the Nth commit attempt. 0 disables crash simulation.
        static CRASH_BEFORE_COMMIT: Cell<usize> = const { Cell::new(0) };

        /// Commit attempts seen so far.
        static COMMIT_COUNT: Cell<usize> = const { Cell::new(0) };

        /// Fail every directory sync after a commit rename.
        static FAIL_DIR_SYNC: Cell<bool> = const { Cell::new(false) };
    }

    /// Simulate a crash on the `n`th commit: the partial image is fully
    /// written and synced, then the engine stops before renaming it.
    ///
    /// ```ignore
    /// // The second persist leaves a partial image behind
    /// fault_injection::set_crash_before_commit(2);
    /// ```
    pub fn set_crash_before_commit(n: usize) {
        CRASH_BEFORE_COMMIT.with(|c| c.set(n));
        COMMIT_COUNT.with(|c| c.set(0));
    }

    /// Called by the engine right before the commit rename.
    pub fn should_crash() -> bool {
        CRASH_BEFORE_COMMIT.with(|threshold_cell| {
            let threshold = threshold_cell.get();
            if threshold == 0 {
                return false;
            }
            COMMIT_COUNT.with(|count_cell| {
                let count = count_cell.get() + 1;
                count_cell.set(count);
                count == threshold
            })
        })
    }

    /// Make the directory sync that follows a commit fail.
    pub fn set_fail_dir_sync(fail: bool) {
        FAIL_DIR_SYNC.with(|c| c.set(fail));
    }

    /// Called by the engine before syncing the storage directory.
    pub fn should_fail_dir_sync() -> bool {
        FAIL_DIR_SYNC.with(Cell::get)
    }

    /// Disable all simulated faults.
    pub fn reset() {
        CRASH_BEFORE_COMMIT.with(|c| c.set(0));
        COMMIT_COUNT.with(|c| c.set(0));
        FAIL_DIR_SYNC.with(|c| c.set(false));
    }
}
