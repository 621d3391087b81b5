//! # Signature
//!
//! A signature pairs the byte pattern that marks an unpatched executable with the replacement that neutralizes it

use std::fmt;

use thiserror::Error;

/// Errors when constructing a [`Signature`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The pattern has no bytes, so it would match everywhere
    #[error("Signature pattern is empty")]
    Empty,
    /// Pattern and replacement differ in length, which would shift every following offset
    #[error("Signature length mismatch: pattern is {pattern} bytes, replacement is {replacement} bytes")]
    LengthMismatch {
        /// Length of the pattern
        pattern: usize,
        /// Length of the replacement
        replacement: usize,
    },
    /// Pattern and replacement are equal, so a patched image can't be told apart from an unpatched one
    #[error("Signature replacement is identical to its pattern")]
    Identical,
}

/// An immutable pattern/replacement pair of identical length.
///
/// The replacement is scanned for first to detect an already-patched image,
/// so it must not be a byte sequence that occurs naturally in the target.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    /// Name used in logs and errors
    name: String,
    /// Bytes present in an unpatched image
    pattern: Vec<u8>,
    /// Bytes written over `pattern`
    replacement: Vec<u8>,
}

impl Signature {
    /// Creates a new signature, validating that `pattern` and `replacement` can be swapped in place
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<Vec<u8>>,
        replacement: impl Into<Vec<u8>>,
    ) -> Result<Self, SignatureError> {
        let pattern = pattern.into();
        let replacement = replacement.into();

        if pattern.is_empty() {
            return Err(SignatureError::Empty);
        }
        if pattern.len() != replacement.len() {
            return Err(SignatureError::LengthMismatch {
                pattern: pattern.len(),
                replacement: replacement.len(),
            });
        }
        if pattern == replacement {
            return Err(SignatureError::Identical);
        }

        Ok(Self {
            name: name.into(),
            pattern,
            replacement,
        })
    }

    /// Name of the signature
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes present in an unpatched image
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Bytes present in a patched image
    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }

    /// Length of the patched region, shared by pattern and replacement
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Always false, a signature can't be constructed empty
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("name", &self.name)
            .field("pattern", &String::from_utf8_lossy(&self.pattern))
            .field("replacement", &String::from_utf8_lossy(&self.replacement))
            .finish()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
