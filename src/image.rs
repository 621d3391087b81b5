//! # Executable Image
//!
//! The full contents of an executable, held in memory for the duration of one patch operation

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PatchError;
use crate::search::{self, Match};

/// Raw bytes of an executable and the path they were read from
pub struct ExecutableImage {
    /// File the image was loaded from
    path: PathBuf,
    /// Contents of the file
    bytes: Vec<u8>,
}

impl ExecutableImage {
    /// Reads the whole file at `path` into memory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PatchError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(PatchError::io(path))?;
        debug!(path = %path.display(), size = bytes.len(), "loaded executable image");
        Ok(Self::from_bytes(path, bytes))
    }

    /// Wraps bytes that are already in memory
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// File the image was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents of the image
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable contents of the image, for use with a [`crate::patcher::Patcher`]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Size of the image in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image has no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Scans the image for `needle`
    pub fn scan(&self, needle: &[u8]) -> Match {
        search::scan(&self.bytes, needle)
    }

    /// Consumes the image, returning its contents
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::error::PatchError;
    use crate::image::ExecutableImage;
    use crate::search::Match;

    #[test]
    /// Loading reads the whole file
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, b"....PATTERNXX....").unwrap();

        let image = ExecutableImage::load(&path).unwrap();
        assert_eq!(image.path(), path);
        assert_eq!(image.len(), 17);
        assert_eq!(image.scan(b"PATTERNXX"), Match::Unique(4));
        assert_eq!(image.into_bytes(), b"....PATTERNXX....");
    }

    #[test]
    /// Missing files are an I/O error carrying the path
    fn test_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");

        match ExecutableImage::load(&path) {
            Err(PatchError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|i| i.len())),
        }
    }
}
