//! Lock files that mark a staged install as alive, and sweeps that reclaim copies left behind by crashed processes
//!
//! Each staged directory holds a `ugff.lock` JSON file with the time it was last refreshed.
//! A copy whose lock stops being refreshed is considered abandoned once it is older than a threshold.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{StageError, STAGE_PREFIX};
use crate::write;

/// File name of the lock inside a staged directory
pub const LOCK_FILE: &str = "ugff.lock";

/// Age after which a staged copy with an unrefreshed lock is reclaimed (20 minutes)
pub const STALE_AFTER: Duration = Duration::from_secs(20 * 60);

/// Contents of a lock file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    /// Seconds since the Unix epoch at the last refresh
    pub timestamp: f64,
    /// Identifier of the staged install holding the lock
    pub id: String,
}

/// What a staged directory's lock says about it
#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    /// There is no lock file
    Missing,
    /// The lock file can't be read or parsed
    Corrupt,
    /// The lock file is valid
    Held(Lock),
}

/// Seconds since the Unix epoch
fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl Lock {
    /// A lock refreshed right now
    pub fn now(id: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            id: id.into(),
        }
    }

    /// Time since the lock was refreshed. Timestamps in the future count as fresh.
    pub fn age(&self) -> Duration {
        let secs = (now() - self.timestamp).max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Atomically writes the lock into `dir`
    pub fn write(&self, dir: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(self)?;
        write::write_atomic(&dir.join(LOCK_FILE), &bytes, None)
    }

    /// Reads the lock in `dir`
    pub fn inspect(dir: &Path) -> LockState {
        let bytes = match fs::read(dir.join(LOCK_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return LockState::Missing,
            Err(_) => return LockState::Corrupt,
        };
        match serde_json::from_slice::<Lock>(&bytes) {
            Ok(lock) if lock.timestamp.is_finite() => LockState::Held(lock),
            _ => LockState::Corrupt,
        }
    }
}

/// Removes staged copies under `base_dir` whose lock is older than `max_age`.
///
/// Copies with a missing or corrupt lock are left alone, see [`deep_clean`]. Returns the removed directories.
pub fn cleanup_stale(base_dir: &Path, max_age: Duration) -> Result<Vec<PathBuf>, StageError> {
    sweep(base_dir, |state| match state {
        LockState::Held(lock) if lock.age() > max_age => Some("stale lock"),
        _ => None,
    })
}

/// Removes staged copies under `base_dir` whose lock is missing or corrupt.
///
/// A copy being created by another process is briefly lockless, so only run this when no other process is staging into `base_dir`.
pub fn deep_clean(base_dir: &Path) -> Result<Vec<PathBuf>, StageError> {
    sweep(base_dir, |state| match state {
        LockState::Missing => Some("missing lock"),
        LockState::Corrupt => Some("corrupt lock"),
        LockState::Held(_) => None,
    })
}

/// Removes every staged directory under `base_dir` for which `verdict` returns a reason
fn sweep<F>(base_dir: &Path, verdict: F) -> Result<Vec<PathBuf>, StageError>
where
    F: Fn(&LockState) -> Option<&'static str>,
{
    let mut removed = Vec::new();
    if !base_dir.is_dir() {
        return Ok(removed);
    }

    for entry in WalkDir::new(base_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StageError::Io {
            path: base_dir.to_path_buf(),
            source: e.into(),
        })?;
        let staged = entry.file_name().to_string_lossy().starts_with(STAGE_PREFIX);
        if !staged || !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        let state = Lock::inspect(dir);
        let reason = match verdict(&state) {
            Some(reason) => reason,
            None => {
                debug!(dir = %dir.display(), ?state, "keeping staged install");
                continue;
            }
        };

        match fs::remove_dir_all(dir) {
            Ok(()) => {
                info!(dir = %dir.display(), reason, "reclaimed staged install");
                removed.push(dir.to_path_buf());
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to reclaim staged install"),
        }
    }
    Ok(removed)
}
