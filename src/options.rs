//! # Options
//!
//! Controls where a patched image is written

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Suffix appended to the file name of a derived output path
pub const DEFAULT_SUFFIX: &str = ".patched";

/// Output configuration for [`crate::ensure_patched`].
///
/// Deserializable so hosts can embed it in their own configuration; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PatchOptions {
    /// Overwrite the original file. Takes precedence over `output_path`.
    /// A symlink is followed, so its target is overwritten and the link is left in place.
    pub in_place: bool,
    /// Explicit output path used when not patching in place
    pub output_path: Option<PathBuf>,
    /// Appended to the input file name when neither `in_place` nor `output_path` is set
    pub suffix: String,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            in_place: false,
            output_path: None,
            suffix: DEFAULT_SUFFIX.to_owned(),
        }
    }
}

impl PatchOptions {
    /// Creates the default, non-destructive options
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the original file is overwritten
    pub fn in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    /// Sets an explicit output path
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the suffix for derived output paths
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Resolves the path a patched copy of `input` is written to
    pub fn resolve_output(&self, input: &Path) -> PathBuf {
        if self.in_place {
            return input.to_path_buf();
        }
        if let Some(path) = &self.output_path {
            return path.clone();
        }

        let mut name = input
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(&self.suffix);
        input.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use crate::options::PatchOptions;

    #[test]
    /// Default output sits next to the input with a suffix
    fn test_derived_output() {
        let options = PatchOptions::default();
        assert!(!options.in_place);
        assert_eq!(
            options.resolve_output(Path::new("/opt/firefox/libxul.so")),
            PathBuf::from("/opt/firefox/libxul.so.patched")
        );

        let options = PatchOptions::new().suffix("-clean");
        assert_eq!(
            options.resolve_output(Path::new("bin/firefox")),
            PathBuf::from("bin/firefox-clean")
        );
    }

    #[test]
    /// `in_place` wins over an explicit output path
    fn test_precedence() {
        let input = Path::new("/opt/firefox/libxul.so");

        let options = PatchOptions::new().output_path("/tmp/out.so");
        assert_eq!(options.resolve_output(input), PathBuf::from("/tmp/out.so"));

        let options = options.in_place(true);
        assert_eq!(options.resolve_output(input), input);
    }

    #[test]
    /// Missing fields fall back to defaults
    fn test_deserialize() {
        let options: PatchOptions = serde_json::from_str(r#"{"in_place": true}"#).unwrap();
        assert_eq!(options, PatchOptions::new().in_place(true));

        let options: PatchOptions =
            serde_json::from_str(r#"{"output_path": "/tmp/out", "suffix": ".x"}"#).unwrap();
        assert_eq!(options.output_path, Some(PathBuf::from("/tmp/out")));
        assert_eq!(options.suffix, ".x");
    }
}
