//! # Patcher
//!
//! This module covers patchers, which overwrite a region of an in-memory image and can restore it on-command

pub mod byte;
pub mod verify;

/// All patchers save the bytes they overwrote and hand back a guard that can revert them
pub trait Patcher {
    /// Error type that can occur when patching
    type Error;
    /// Guard type for the patcher. When this guard is dropped without being committed, the region should be restored.
    type Guard<'a>: PatchGuard + 'a;

    /// Overwrites `buffer[offset..offset + patch.len()]` with `patch`
    fn patch<'a>(
        &self,
        buffer: &'a mut [u8],
        offset: usize,
        patch: &[u8],
    ) -> Result<Self::Guard<'a>, Self::Error>;
}

/// Guard for a patch
///
/// Guards must fully restore the region when dropped, unless `commit` was called
pub trait PatchGuard: Sized {
    /// The patched buffer, as it currently reads
    fn bytes(&self) -> &[u8];

    /// Keeps the patch, so the region is not restored when the guard goes away
    fn commit(self);

    /// Restores the original value of a patch
    fn restore(self) {
        // most implementations have their functionality in their [`Drop::drop`] implementation
    }
}
