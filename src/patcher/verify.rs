//! This module contains a patcher which refuses to overwrite bytes it doesn't expect

use thiserror::Error;

use super::Patcher;

/// Errors when using verified patching
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError<E> {
    /// The bytes at the patch location are not the expected pattern
    #[error("Unexpected bytes at offset {offset:#x}")]
    Mismatch {
        /// Offset that was checked
        offset: usize,
    },
    /// The patch is not the same length as the expected pattern
    #[error("Patch is {patch} bytes but expected pattern is {expected} bytes")]
    LengthMismatch {
        /// Length of the expected pattern
        expected: usize,
        /// Length of the patch
        patch: usize,
    },
    /// Custom error type from the underlying patcher
    #[error("{0}")]
    Inner(E),
}

/// This struct wraps patchers so that they only write over a known pattern.
/// It compares the target region with `expected`, and only then hands the patch to the underlying patcher.
///
/// Regions that fall outside the buffer are passed through so the underlying patcher can report them.
pub struct VerifyingPatcher<P: Patcher> {
    /// Underlying patcher.
    patcher: P,
    /// Bytes that must be present before patching
    expected: Vec<u8>,
}
impl<P: Patcher> VerifyingPatcher<P> {
    /// Creates a new VerifyingPatcher
    pub fn new(patcher: P, expected: impl Into<Vec<u8>>) -> Self {
        Self {
            patcher,
            expected: expected.into(),
        }
    }
}

impl<P: Patcher> Patcher for VerifyingPatcher<P> {
    type Error = VerifyError<P::Error>;
    type Guard<'a> = P::Guard<'a>;

    fn patch<'a>(
        &self,
        buffer: &'a mut [u8],
        offset: usize,
        patch: &[u8],
    ) -> Result<Self::Guard<'a>, Self::Error> {
        if patch.len() != self.expected.len() {
            return Err(VerifyError::LengthMismatch {
                expected: self.expected.len(),
                patch: patch.len(),
            });
        }

        let current = offset
            .checked_add(patch.len())
            .and_then(|end| buffer.get(offset..end));
        if let Some(current) = current {
            if current != self.expected.as_slice() {
                return Err(VerifyError::Mismatch { offset });
            }
        }

        self.patcher
            .patch(buffer, offset, patch)
            .map_err(VerifyError::Inner)
    }
}
