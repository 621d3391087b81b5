//! # Error
//!
//! Errors surfaced by [`crate::ensure_patched`]
//!
//! I/O failures are kept apart from search outcomes so callers can tell
//! "the file couldn't be read or written" from "the patch logic ran and found nothing or too much".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::patcher::byte::BoundsError;
use crate::patcher::verify::VerifyError;

/// Error from the in-memory patcher, see [`crate::patcher`]
pub type PatchRegionError = VerifyError<BoundsError>;

/// Errors when patching an executable
#[derive(Debug, Error)]
pub enum PatchError {
    /// The file is missing, unreadable or unwritable
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// The unpatched pattern doesn't occur, so the layout of the target is unrecognized
    #[error("Signature `{signature}` not found in {}", .path.display())]
    NotFound {
        /// File that was searched
        path: PathBuf,
        /// Name of the signature
        signature: String,
    },
    /// The unpatched pattern occurs more than once, so no occurrence is safe to patch
    #[error("Signature `{signature}` occurs {count} times in {}", .path.display())]
    AmbiguousMatch {
        /// File that was searched
        path: PathBuf,
        /// Name of the signature
        signature: String,
        /// Number of occurrences
        count: usize,
        /// Offset of every occurrence
        offsets: Vec<usize>,
    },
    /// The in-memory patch could not be applied
    #[error("Failed to patch {}: {source}", .path.display())]
    Patch {
        /// File being patched
        path: PathBuf,
        /// Underlying error
        source: PatchRegionError,
    },
}

impl PatchError {
    /// Wraps an I/O error with the path it occurred on
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
