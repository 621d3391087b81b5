//! # Apply
//!
//! Ensures an executable on disk carries a [`Signature`]'s replacement instead of its pattern

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::PatchError;
use crate::image::ExecutableImage;
use crate::options::PatchOptions;
use crate::patcher::byte::BytePatcher;
use crate::patcher::verify::VerifyingPatcher;
use crate::patcher::{PatchGuard, Patcher};
use crate::search::Match;
use crate::signature::Signature;
use crate::write;

/// What [`ensure_patched`] found and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStatus {
    /// The replacement was already present; nothing was written
    AlreadyPatched,
    /// The single occurrence of the pattern was replaced at `offset`
    Patched {
        /// Offset of the rewritten region
        offset: usize,
    },
    /// Neither pattern nor replacement occurs; nothing was written
    NotFound,
    /// The pattern occurs more than once; nothing was written
    AmbiguousMatch {
        /// Offset of every occurrence
        offsets: Vec<usize>,
    },
}

/// Outcome of [`ensure_patched`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    /// What was found and done
    pub status: PatchStatus,
    /// The patched output for [`PatchStatus::Patched`], otherwise the untouched input
    pub path: PathBuf,
    /// Name of the signature that was enforced
    pub signature: String,
}

impl PatchResult {
    /// Whether `path` is known to carry the replacement
    pub fn is_patched(&self) -> bool {
        matches!(
            self.status,
            PatchStatus::AlreadyPatched | PatchStatus::Patched { .. }
        )
    }

    /// Returns the patched path, turning search failures into errors for callers that won't run an unpatched binary
    pub fn require_patched(self) -> Result<PathBuf, PatchError> {
        match self.status {
            PatchStatus::AlreadyPatched | PatchStatus::Patched { .. } => Ok(self.path),
            PatchStatus::NotFound => Err(PatchError::NotFound {
                path: self.path,
                signature: self.signature,
            }),
            PatchStatus::AmbiguousMatch { offsets } => Err(PatchError::AmbiguousMatch {
                path: self.path,
                signature: self.signature,
                count: offsets.len(),
                offsets,
            }),
        }
    }
}

/// Makes sure the executable at `path` has `signature` neutralized.
///
/// 1. If the replacement already occurs, returns [`PatchStatus::AlreadyPatched`] without writing.
/// 2. If the pattern occurs exactly once, rewrites that region and atomically writes the result
///    to the path chosen by `options`.
/// 3. If the pattern occurs zero or several times, returns [`PatchStatus::NotFound`] or
///    [`PatchStatus::AmbiguousMatch`] without writing. Whether to continue unpatched is up to the caller,
///    see [`PatchResult::require_patched`].
///
/// Missing, unreadable or unwritable files fail with [`PatchError::Io`].
pub fn ensure_patched(
    path: impl AsRef<Path>,
    signature: &Signature,
    options: &PatchOptions,
) -> Result<PatchResult, PatchError> {
    ensure_patched_with(path.as_ref(), signature, options, |_| Ok(()))
}

/// [`ensure_patched`] with a hook that runs right before the patched file is renamed into place
pub(crate) fn ensure_patched_with<F>(
    path: &Path,
    signature: &Signature,
    options: &PatchOptions,
    before_rename: F,
) -> Result<PatchResult, PatchError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let mut image = ExecutableImage::load(path)?;
    let result = |status: PatchStatus| PatchResult {
        status,
        path: path.to_path_buf(),
        signature: signature.name().to_owned(),
    };

    let existing = image.scan(signature.replacement());
    if existing != Match::None {
        debug!(
            path = %path.display(),
            signature = %signature,
            count = existing.count(),
            "replacement already present"
        );
        return Ok(result(PatchStatus::AlreadyPatched));
    }

    let found = image.scan(signature.pattern());
    debug!(
        path = %path.display(),
        signature = %signature,
        count = found.count(),
        "scanned for signature pattern"
    );
    let offset = match found {
        Match::Unique(offset) => offset,
        Match::None => {
            warn!(path = %path.display(), signature = %signature, "signature not found");
            return Ok(result(PatchStatus::NotFound));
        }
        Match::Multiple(offsets) => {
            warn!(
                path = %path.display(),
                signature = %signature,
                count = offsets.len(),
                "signature is ambiguous, refusing to patch"
            );
            return Ok(result(PatchStatus::AmbiguousMatch { offsets }));
        }
    };

    let output = resolve_output(path, options)?;
    let permissions = fs::metadata(path)
        .map_err(PatchError::io(path))?
        .permissions();

    let patcher = VerifyingPatcher::new(BytePatcher::new(), signature.pattern());
    let guard = patcher
        .patch(image.bytes_mut(), offset, signature.replacement())
        .map_err(|source| PatchError::Patch {
            path: path.to_path_buf(),
            source,
        })?;

    // the guard restores the image if the write fails
    write::write_atomic_with(&output, guard.bytes(), Some(permissions), before_rename)
        .map_err(PatchError::io(&output))?;
    guard.commit();

    info!(
        path = %output.display(),
        offset,
        signature = %signature,
        "patched executable"
    );
    Ok(PatchResult {
        status: PatchStatus::Patched { offset },
        path: output,
        signature: signature.name().to_owned(),
    })
}

/// Where the patched image goes. In-place writes through a symlink land on the link's target,
/// since renaming over the link itself would leave the target unpatched.
fn resolve_output(path: &Path, options: &PatchOptions) -> Result<PathBuf, PatchError> {
    if !options.in_place {
        return Ok(options.resolve_output(path));
    }
    let metadata = fs::symlink_metadata(path).map_err(PatchError::io(path))?;
    if metadata.file_type().is_symlink() {
        fs::canonicalize(path).map_err(PatchError::io(path))
    } else {
        Ok(path.to_path_buf())
    }
}
