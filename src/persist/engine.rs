//! persist::engine
//!
//! Crash-safe image writer and latest-image recovery.
//!
//! # Write Protocol
//!
//! `persist` never opens an existing image for writing:
//!
//! 1. Pick a sequence strictly greater than any image on disk and create
//!    `db.<seq>.partial` with `create_new`.
//! 2. Write every record, `sync_all`, close.
//! 3. Rename to `db.<seq>.FULL` (refused if that name exists) and sync the
//!    directory.
//!
//! Any failure before the rename removes the partial file (best effort) and
//! leaves older images untouched. Once the sequence space is used up,
//! `persist` fails instead of reusing a name. A failed directory sync after
//! the rename is logged and the image still counts as committed.
//!
//! # Recovery
//!
//! `load_latest` picks the highest complete image. Partial images are
//! ignored. A missing image means a fresh start, never an error.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::codec;
use super::image::{self, ImageId, ImageInfo, ImageState};
use super::lock::{LockError, StorageLock};
use super::{PersistError, RecoveryPolicy, SnapshotStore};
use crate::core::paths::StoragePaths;
use crate::core::registry::Snapshot;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read-only access to the images in a storage directory.
///
/// Does not take the storage lock, so it can inspect a directory that a
/// running engine owns.
#[derive(Debug, Clone)]
pub struct ImageReader {
    paths: StoragePaths,
    recovery: RecoveryPolicy,
}

impl ImageReader {
    /// Create a reader for `root` with the default (strict) recovery policy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: StoragePaths::new(root.into()),
            recovery: RecoveryPolicy::default(),
        }
    }

    /// Set the policy applied when the newest complete image is corrupt.
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Storage path routing.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// All image files, newest first. A missing directory has no images.
    pub fn images(&self) -> Result<Vec<ImageInfo>, PersistError> {
        let root = self.paths.root();
        if !root.exists() {
            return Ok(vec![]);
        }

        let names = fs::read_dir(root)
            .map_err(io_error(root))?
            .map(|entry| entry.map(|e| e.file_name()));
        collect_images(root, names)
    }

    /// Load the newest complete image, or an empty snapshot if there is none.
    ///
    /// # Errors
    ///
    /// - [`PersistError::CorruptImage`] if the newest complete image does not
    ///   decode (with [`RecoveryPolicy::Fallback`], only if none decodes)
    /// - [`PersistError::Io`] if the directory or an image cannot be read
    pub fn load_latest(&self) -> Result<Snapshot, PersistError> {
        let images = self.images()?;
        let partial = images
            .iter()
            .filter(|info| info.state == ImageState::Partial)
            .count();
        if partial > 0 {
            debug!(partial, "ignoring incomplete images");
        }

        let mut first_error = None;
        for info in images
            .iter()
            .filter(|info| info.state == ImageState::Complete)
        {
            match self.read_image(info.id) {
                Ok(snapshot) => {
                    info!(image = %info.id, guests = snapshot.len(), "loaded durable image");
                    return Ok(snapshot);
                }
                Err(err @ PersistError::CorruptImage { .. })
                    if self.recovery == RecoveryPolicy::Fallback =>
                {
                    warn!(image = %info.id, error = %err, "corrupt image, falling back to previous");
                    first_error.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("no durable image found, starting empty");
                Ok(Snapshot::empty())
            }
        }
    }

    fn read_image(&self, id: ImageId) -> Result<Snapshot, PersistError> {
        let path = self.paths.image_path(id, ImageState::Complete);
        let file = File::open(&path).map_err(io_error(&path))?;
        codec::decode(BufReader::new(file), &path)
    }
}

/// Owner of a storage directory.
///
/// Holds the directory's [`StorageLock`] for its whole lifetime.
#[derive(Debug)]
pub struct PersistenceEngine {
    reader: ImageReader,
    /// Highest sequence handed out or found on disk. The mutex also
    /// serializes concurrent `persist` calls.
    last_seq: Mutex<u64>,
    _lock: StorageLock,
}

impl PersistenceEngine {
    /// Open (creating if needed) and lock a storage directory.
    ///
    /// # Errors
    ///
    /// - [`PersistError::Configuration`] if the directory cannot be created,
    ///   is not a directory, or cannot hold a lock file
    /// - [`PersistError::Locked`] if another engine owns it
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let reader = ImageReader::new(root);
        let paths = reader.paths().clone();
        let root = paths.root();

        fs::create_dir_all(root).map_err(|e| {
            PersistError::Configuration(format!("cannot create {}: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(PersistError::Configuration(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let lock = StorageLock::acquire(&paths).map_err(|e| match e {
            LockError::AlreadyLocked => PersistError::Locked {
                path: root.to_path_buf(),
            },
            other => PersistError::Configuration(other.to_string()),
        })?;

        let last_seq = reader
            .images()?
            .first()
            .map(|info| info.id.seq())
            .unwrap_or(0);
        debug!(dir = %root.display(), last_seq, "opened storage directory");

        Ok(Self {
            reader,
            last_seq: Mutex::new(last_seq),
            _lock: lock,
        })
    }

    /// Set the policy applied when the newest complete image is corrupt.
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.reader = self.reader.with_recovery(recovery);
        self
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        self.reader.paths().root()
    }

    /// All image files, newest first.
    pub fn images(&self) -> Result<Vec<ImageInfo>, PersistError> {
        self.reader.images()
    }

    /// Load the newest complete image. See [`ImageReader::load_latest`].
    pub fn load_latest(&self) -> Result<Snapshot, PersistError> {
        self.reader.load_latest()
    }

    /// Write `snapshot` as a new complete image and return its id.
    ///
    /// Blocking file I/O: call it from a blocking context, never while
    /// holding the registry lock.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<ImageId, PersistError> {
        codec::check_encodable(snapshot)?;

        let mut last_seq = self.last_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ImageId::new(next_sequence(*last_seq).ok_or(PersistError::SequenceExhausted)?);
        // Reserve the sequence before touching disk so a failed attempt's
        // name is never reused.
        *last_seq = id.seq();

        let paths = self.reader.paths();
        let partial = paths.image_path(id, ImageState::Partial);
        let complete = paths.image_path(id, ImageState::Complete);

        if let Err(err) = write_partial(&partial, snapshot) {
            discard_partial(&partial);
            return Err(err);
        }

        #[cfg(any(test, feature = "fault_injection"))]
        if super::fault_injection::should_crash() {
            return Err(PersistError::Io {
                path: partial,
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated crash before commit",
                ),
            });
        }

        if let Err(err) = commit(&partial, &complete) {
            discard_partial(&partial);
            return Err(err);
        }
        // Already visible under its final name; report it as committed.
        if let Err(err) = sync_dir(paths.root()) {
            warn!(image = %id, error = %err, "committed image but directory sync failed");
        }

        debug!(image = %id, guests = snapshot.len(), "committed image");
        Ok(id)
    }
}

impl SnapshotStore for PersistenceEngine {
    fn persist(&self, snapshot: &Snapshot) -> Result<ImageId, PersistError> {
        PersistenceEngine::persist(self, snapshot)
    }
}

/// Image files among directory `names`, newest first. A failed entry read
/// fails the listing; a name that is not UTF-8 is never an image.
fn collect_images<I>(root: &Path, names: I) -> Result<Vec<ImageInfo>, PersistError>
where
    I: IntoIterator<Item = std::io::Result<OsString>>,
{
    let mut images = Vec::new();
    for name in names {
        let name = name.map_err(io_error(root))?;
        if let Some(info) = name.to_str().and_then(image::parse_file_name) {
            images.push(info);
        }
    }
    images.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(images)
}

/// Next sequence: wall-clock milliseconds, bumped past `last` if the clock
/// has not moved or went backwards. `None` once `u64::MAX` is taken.
fn next_sequence(last: u64) -> Option<u64> {
    let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
    last.checked_add(1).map(|next| now.max(next))
}

/// Rename `partial` to `complete`, refusing to replace an existing image.
///
/// The storage lock and the sequence mutex make this check race-free.
fn commit(partial: &Path, complete: &Path) -> Result<(), PersistError> {
    if complete.exists() {
        return Err(PersistError::ImageExists {
            path: complete.to_path_buf(),
        });
    }
    fs::rename(partial, complete).map_err(io_error(complete))
}

fn write_partial(path: &Path, snapshot: &Snapshot) -> Result<(), PersistError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_error(path))?;

    let mut writer = BufWriter::new(file);
    codec::encode(snapshot, &mut writer).map_err(io_error(path))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_error(path)(e.into_error()))?;
    file.sync_all().map_err(io_error(path))?;
    Ok(())
}

fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial image");
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), PersistError> {
    #[cfg(any(test, feature = "fault_injection"))]
    if super::fault_injection::should_fail_dir_sync() {
        return Err(io_error(dir)(std::io::Error::new(
            std::io::ErrorKind::Other,
            "simulated directory sync failure",
        )));
    }
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(io_error(dir))
}

#[cfg(not(unix))]
fn sync_dir(dir: &Path) -> Result<(), PersistError> {
    #[cfg(any(test, feature = "fault_injection"))]
    if super::fault_injection::should_fail_dir_sync() {
        return Err(io_error(dir)(std::io::Error::new(
            std::io::ErrorKind::Other,
            "simulated directory sync failure",
        )));
    }
    let _ = dir;
    Ok(())
}
