//! # Staging
//!
//! Copies a browser install into a private temporary directory and patches the marker library there,
//! leaving the system install untouched. The copy is removed when the [`StagedInstall`] is dropped.
//!
//! Copies left behind by a process that never dropped its [`StagedInstall`] are found through their
//! lock file and reclaimed with [`lock::cleanup_stale`] or [`lock::deep_clean`].

pub mod lock;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use self::lock::Lock;
use crate::apply::{ensure_patched, PatchResult};
use crate::discovery::Installation;
use crate::error::PatchError;
use crate::options::PatchOptions;
use crate::signature::Signature;

/// Prefix of every staging directory
pub const STAGE_PREFIX: &str = "ugff_";

/// Errors when staging an install
#[derive(Debug, Error)]
pub enum StageError {
    /// The staging directory or its lock could not be created, listed or updated
    #[error("Staging I/O error on {}: {source}", .path.display())]
    Io {
        /// Directory being worked on
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Part of the install could not be copied
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        /// Source path
        from: PathBuf,
        /// Destination path
        to: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Patching the staged library failed
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// A private copy of an install
pub struct StagedInstall {
    /// Owner of the copy. `Option` so that [`StagedInstall::keep`] can take it
    dir: Option<TempDir>,
    /// Root of the copy
    root: PathBuf,
    /// Unique part of the directory name, recorded in the lock
    id: String,
    /// Executable inside the copy
    executable: PathBuf,
    /// Marker library inside the copy
    library: PathBuf,
}

impl StagedInstall {
    /// Copies `installation` into a new uniquely named, locked directory under `base_dir`
    pub fn create(
        installation: &Installation,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self, StageError> {
        let base_dir = base_dir.as_ref();
        let io_err = |source: io::Error| StageError::Io {
            path: base_dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(base_dir).map_err(io_err)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGE_PREFIX)
            .tempdir_in(base_dir)
            .map_err(io_err)?;
        let root = dir.path().to_path_buf();
        let id = root
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
            .trim_start_matches(STAGE_PREFIX)
            .to_owned();

        // locked before copying so a sweep never sees a half-copied, lockless directory for long
        Lock::now(&id).write(&root).map_err(|source| StageError::Io {
            path: root.clone(),
            source,
        })?;
        copy_tree(&installation.dir, &root)?;

        let rebase = |path: &Path| match path.strip_prefix(&installation.dir) {
            Ok(relative) => root.join(relative),
            Err(_) => root.join(path.file_name().unwrap_or_default()),
        };
        let executable = rebase(&installation.executable);
        let library = rebase(&installation.library);

        info!(
            from = %installation.dir.display(),
            to = %root.display(),
            id = %id,
            "staged browser install"
        );
        Ok(Self {
            dir: Some(dir),
            root,
            id,
            executable,
            library,
        })
    }

    /// Root of the copy
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Identifier recorded in the copy's lock
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Executable inside the copy, to be handed to the launch layer
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Marker library inside the copy
    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Refreshes the copy's lock so sweeps keep treating it as alive.
    ///
    /// Long-running callers should call this well within [`lock::STALE_AFTER`].
    pub fn touch_lock(&self) -> Result<(), StageError> {
        Lock::now(&self.id)
            .write(&self.root)
            .map_err(|source| StageError::Io {
                path: self.root.clone(),
                source,
            })
    }

    /// Patches the staged library in place
    pub fn patch(&self, signature: &Signature) -> Result<PatchResult, StageError> {
        let options = PatchOptions::new().in_place(true);
        Ok(ensure_patched(&self.library, signature, &options)?)
    }

    /// Keeps the copy on disk after this value is gone, returning its root
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            #[allow(deprecated)]
            let _ = dir.into_path();
        }
        self.root.clone()
    }
}

impl Drop for StagedInstall {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!(dir = %self.root.display(), "removing staged install");
            if let Err(e) = dir.close() {
                warn!(dir = %self.root.display(), error = %e, "failed to remove staged install");
            }
        }
    }
}

/// Copies the contents of `from` into the existing directory `to`.
///
/// On Unix symlinks are recreated as symlinks; elsewhere they are followed and their targets copied.
fn copy_tree(from: &Path, to: &Path) -> Result<(), StageError> {
    for entry in WalkDir::new(from).min_depth(1).follow_links(cfg!(not(unix))) {
        let entry = entry.map_err(|e| StageError::Copy {
            from: e.path().unwrap_or(from).to_path_buf(),
            to: to.to_path_buf(),
            source: e.into(),
        })?;
        let source = entry.path();
        let relative = match source.strip_prefix(from) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = to.join(relative);

        let file_type = entry.file_type();
        let result = if file_type.is_dir() {
            fs::create_dir(&target)
        } else if file_type.is_symlink() {
            copy_link(source, &target)
        } else {
            fs::copy(source, &target).map(|_| ())
        };
        result.map_err(|source_err| StageError::Copy {
            from: source.to_path_buf(),
            to: target.clone(),
            source: source_err,
        })?;
    }
    Ok(())
}

/// Recreates the symlink at `source` as `target`
#[cfg(unix)]
fn copy_link(source: &Path, target: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)
}

/// Copies the file behind the link at `source`
#[cfg(not(unix))]
fn copy_link(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::apply::PatchStatus;
    use crate::discovery::Installation;
    use crate::signature::Signature;
    use crate::staging::lock::{self, Lock, LockState, STALE_AFTER};
    use crate::staging::{StagedInstall, STAGE_PREFIX};

    /// Lays out a small install under `dir`
    fn install(dir: &Path) -> Installation {
        fs::create_dir_all(dir.join("defaults").join("pref")).unwrap();
        fs::write(dir.join("firefox"), b"#!/bin/sh\n").unwrap();
        fs::write(dir.join("libxul.so"), b"....PATTERNXX....").unwrap();
        fs::write(dir.join("defaults").join("pref").join("prefs.js"), b"// prefs").unwrap();
        Installation {
            dir: dir.to_path_buf(),
            executable: dir.join("firefox"),
            library: dir.join("libxul.so"),
        }
    }

    /// Signature used throughout these tests
    fn signature() -> Signature {
        Signature::new("marker", b"PATTERNXX".to_vec(), b"REPLACED!".to_vec()).unwrap()
    }

    #[test]
    /// The whole tree is copied and the copy is patched, not the original
    fn test_stage_and_patch() {
        let root = tempfile::tempdir().unwrap();
        let installation = install(&root.path().join("firefox"));
        let base = root.path().join("staging");

        let staged = StagedInstall::create(&installation, &base).unwrap();
        assert!(staged
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(STAGE_PREFIX));
        assert_eq!(staged.executable(), staged.dir().join("firefox"));
        assert_eq!(
            fs::read(staged.dir().join("defaults").join("pref").join("prefs.js")).unwrap(),
            b"// prefs"
        );

        let result = staged.patch(&signature()).unwrap();
        assert_eq!(result.status, PatchStatus::Patched { offset: 4 });
        assert_eq!(result.path, staged.library());
        assert_eq!(fs::read(staged.library()).unwrap(), b"....REPLACED!....");
        assert_eq!(fs::read(&installation.library).unwrap(), b"....PATTERNXX....");

        // patching the same copy again is a no-op
        let again = staged.patch(&signature()).unwrap();
        assert_eq!(again.status, PatchStatus::AlreadyPatched);
    }

    #[test]
    /// Dropping removes the copy, keeping retains it
    fn test_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let installation = install(&root.path().join("firefox"));
        let base = root.path().join("staging");

        let staged = StagedInstall::create(&installation, &base).unwrap();
        let dir = staged.dir().to_path_buf();
        assert!(dir.is_dir());
        drop(staged);
        assert!(!dir.exists());

        let staged = StagedInstall::create(&installation, &base).unwrap();
        let kept = staged.keep();
        assert!(kept.join("libxul.so").is_file());
    }

    #[cfg(unix)]
    #[test]
    /// Symlinks inside the install are reproduced as symlinks
    fn test_symlinks() {
        use std::os::unix::fs::symlink;

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("firefox");
        let installation = install(&dir);
        symlink("firefox", dir.join("firefox-bin")).unwrap();

        let staged = StagedInstall::create(&installation, root.path().join("staging")).unwrap();
        let link = staged.dir().join("firefox-bin");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("firefox"));
    }

    #[test]
    /// A missing install is a copy error
    fn test_missing_install() {
        let root = tempfile::tempdir().unwrap();
        let installation = Installation {
            dir: root.path().join("nope"),
            executable: root.path().join("nope").join("firefox"),
            library: root.path().join("nope").join("libxul.so"),
        };

        let err = StagedInstall::create(&installation, root.path().join("staging")).err().unwrap();
        assert!(matches!(err, crate::staging::StageError::Copy { .. }));
    }

    #[test]
    /// Every copy carries a lock naming it, and refreshing rewrites it
    fn test_lock() {
        let root = tempfile::tempdir().unwrap();
        let installation = install(&root.path().join("firefox"));

        let staged = StagedInstall::create(&installation, root.path().join("staging")).unwrap();
        assert!(!staged.id().is_empty());
        assert!(staged.dir().ends_with(format!("{}{}", STAGE_PREFIX, staged.id())));
        match Lock::inspect(staged.dir()) {
            LockState::Held(held) => assert_eq!(held.id, staged.id()),
            other => panic!("unexpected state: {:?}", other),
        }

        fs::remove_file(staged.dir().join(lock::LOCK_FILE)).unwrap();
        staged.touch_lock().unwrap();
        assert!(matches!(Lock::inspect(staged.dir()), LockState::Held(_)));
    }

    #[test]
    /// A copy abandoned without dropping is reclaimed once its lock goes stale
    fn test_crash_recovery() {
        let root = tempfile::tempdir().unwrap();
        let installation = install(&root.path().join("firefox"));
        let base = root.path().join("staging");

        let crashed = StagedInstall::create(&installation, &base).unwrap();
        let leaked = crashed.dir().to_path_buf();
        let id = crashed.id().to_owned();
        std::mem::forget(crashed);

        let live = StagedInstall::create(&installation, &base).unwrap();
        assert_eq!(fs::read_dir(&base).unwrap().count(), 2);

        // still fresh, so nothing is reclaimed yet
        assert!(lock::cleanup_stale(&base, STALE_AFTER).unwrap().is_empty());

        let mut old = Lock::now(id);
        old.timestamp -= STALE_AFTER.as_secs_f64() + 60.0;
        old.write(&leaked).unwrap();

        let removed = lock::cleanup_stale(&base, STALE_AFTER).unwrap();
        assert_eq!(removed, [leaked.clone()]);
        assert!(!leaked.exists());
        assert!(live.dir().is_dir());
    }
}
