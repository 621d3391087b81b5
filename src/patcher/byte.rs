//! This module contains a byte patcher

use thiserror::Error;

use super::{PatchGuard, Patcher};

/// The patch region does not fit inside the buffer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Patch of {len} bytes at offset {offset:#x} exceeds buffer of {size} bytes")]
pub struct BoundsError {
    /// Requested offset
    pub offset: usize,
    /// Length of the patch
    pub len: usize,
    /// Length of the buffer
    pub size: usize,
}

/// Patcher for overwriting buffer regions with byte arrays.
/// This patcher only fails when the region is out of bounds.
#[derive(Default)]
pub struct BytePatcher;
impl BytePatcher {
    /// Creates a new [`BytePatcher`]
    pub fn new() -> Self {
        Self::default()
    }
}
impl Patcher for BytePatcher {
    type Error = BoundsError;
    type Guard<'a> = BytePatchGuard<'a>;

    fn patch<'a>(
        &self,
        buffer: &'a mut [u8],
        offset: usize,
        patch: &[u8],
    ) -> Result<Self::Guard<'a>, Self::Error> {
        BytePatchGuard::patch(buffer, offset, patch)
    }
}

/// Guard for byte-patches
///
/// See [`BytePatcher`].
pub struct BytePatchGuard<'a> {
    /// Buffer containing the patch
    buffer: &'a mut [u8],
    /// Original data from the patched region
    original: Vec<u8>,
    /// Offset of the patch
    offset: usize,
    /// Whether the patch should outlive the guard
    committed: bool,
}
impl<'a> BytePatchGuard<'a> {
    /// Patches a region, returning a guard for unpatching
    fn patch(buffer: &'a mut [u8], offset: usize, patch: &[u8]) -> Result<Self, BoundsError> {
        let bounds = BoundsError {
            offset,
            len: patch.len(),
            size: buffer.len(),
        };
        let end = offset.checked_add(patch.len()).ok_or_else(|| bounds.clone())?;
        let region = buffer.get_mut(offset..end).ok_or(bounds)?;

        let original = region.to_vec();
        region.copy_from_slice(patch);

        Ok(Self {
            buffer,
            original,
            offset,
            committed: false,
        })
    }
}
impl PatchGuard for BytePatchGuard<'_> {
    fn bytes(&self) -> &[u8] {
        self.buffer
    }

    fn commit(mut self) {
        self.committed = true;
    }
}
impl Drop for BytePatchGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let end = self.offset + self.original.len();
        // bounds were checked when the guard was created
        self.buffer[self.offset..end].copy_from_slice(&self.original);
    }
}
