//! # Atomic Write
//!
//! Writes a file by filling a temporary sibling and renaming it over the target,
//! so readers observe either the old contents or the complete new contents.

use std::ffi::OsString;
use std::fs::Permissions;
use std::io::{self, Write};
use std::path::Path;

use tracing::trace;

/// Atomically replaces the contents of `target` with `bytes`.
///
/// The temporary file is created in the target's directory so the final rename never crosses filesystems.
/// If `permissions` is given it is applied to the new file before it becomes visible.
pub fn write_atomic(
    target: &Path,
    bytes: &[u8],
    permissions: Option<Permissions>,
) -> io::Result<()> {
    write_atomic_with(target, bytes, permissions, |_| Ok(()))
}

/// [`write_atomic`], calling `before_rename` with the flushed temporary file right before it is renamed.
///
/// An error from `before_rename` aborts the write and removes the temporary file.
pub(crate) fn write_atomic_with<F>(
    target: &Path,
    bytes: &[u8],
    permissions: Option<Permissions>,
    before_rename: F,
) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    if let Some(name) = target.file_name() {
        prefix.push(name);
    }
    prefix.push(".");

    // dropped, and therefore deleted, on every early return below
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    trace!(temp = %temp.path().display(), target = %target.display(), "writing temporary file");

    temp.write_all(bytes)?;
    temp.flush()?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.as_file().sync_all()?;

    before_rename(temp.path())?;

    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
