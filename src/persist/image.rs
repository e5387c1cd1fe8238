//! persist::image
//!
//! Durable image identity and file naming.
//!
//! An image file is named `db.<seq>.<suffix>` where `<seq>` is the
//! zero-padded sequence marker and `<suffix>` is the completion marker:
//! `FULL` once committed, `partial` while in progress. Zero padding keeps
//! a plain directory listing in sequence order.

use std::fmt;

const PREFIX: &str = "db.";
const COMPLETE_SUFFIX: &str = "FULL";
const PARTIAL_SUFFIX: &str = "partial";
const SEQ_WIDTH: usize = 20;

/// Sequence marker identifying one durable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(u64);

impl ImageId {
    /// Wrap a raw sequence number.
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw sequence number.
    pub const fn seq(self) -> u64 {
        self.0
    }

    /// File name for this image in the given state.
    pub fn file_name(self, state: ImageState) -> String {
        format!("{PREFIX}{:0width$}.{}", self.0, state.suffix(), width = SEQ_WIDTH)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion state encoded in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Written, synced, and atomically renamed into place.
    Complete,
    /// In progress, or abandoned by a crash mid-write.
    Partial,
}

impl ImageState {
    fn suffix(self) -> &'static str {
        match self {
            ImageState::Complete => COMPLETE_SUFFIX,
            ImageState::Partial => PARTIAL_SUFFIX,
        }
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageState::Complete => write!(f, "complete"),
            ImageState::Partial => write!(f, "partial"),
        }
    }
}

/// An image file found in the storage directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: ImageId,
    pub state: ImageState,
}

/// Parse an image file name. Returns `None` for anything that is not an
/// image written by [`ImageId::file_name`], including unpadded or
/// non-numeric sequences.
pub fn parse_file_name(name: &str) -> Option<ImageInfo> {
    let rest = name.strip_prefix(PREFIX)?;
    let (seq, suffix) = rest.split_once('.')?;
    if seq.len() != SEQ_WIDTH || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let state = match suffix {
        COMPLETE_SUFFIX => ImageState::Complete,
        PARTIAL_SUFFIX => ImageState::Partial,
        _ => return None,
    };
    let seq = seq.parse().ok()?;
    Some(ImageInfo {
        id: ImageId::new(seq),
        state,
    })
}
