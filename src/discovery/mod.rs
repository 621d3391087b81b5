//! # Discovery
//!
//! This module covers locating a browser install and the marker library inside it.
//! The patcher itself makes no assumption about where its input came from; launch layers plug a
//! [`ExecutableDiscovery`] in front of it.

pub mod platform;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

pub use self::platform::PlatformConfig;

/// Errors when locating an install
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No table exists for this operating system
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
    /// An explicit install directory was given but is not a directory
    #[error("Install directory override {} is not a directory", .0.display())]
    InvalidOverride(PathBuf),
    /// An executable was found but the marker library next to it wasn't
    #[error("Found an install in {} but it has no {library}", .dir.display())]
    LibraryMissing {
        /// Install directory
        dir: PathBuf,
        /// Expected library file name
        library: String,
    },
    /// No candidate directory holds a browser executable
    #[error("Could not find a browser install in {} candidate locations", .searched.len())]
    NotFound {
        /// Every directory that was checked
        searched: Vec<PathBuf>,
    },
}

/// A located install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Directory containing the executable and its libraries
    pub dir: PathBuf,
    /// Browser executable inside `dir`
    pub executable: PathBuf,
    /// Library carrying the marker inside `dir`
    pub library: PathBuf,
}

/// Trait for anything that can supply an install to patch
pub trait ExecutableDiscovery {
    /// Locates an install
    fn discover(&self) -> Result<Installation, DiscoveryError>;
}

/// Discovery by explicit directory, then well-known install locations, then `PATH`.
///
/// Finding the install by launching the browser and inspecting the process is not attempted.
#[derive(Debug, Clone)]
pub struct SearchPathDiscovery {
    /// Names and locations to search
    config: PlatformConfig,
    /// Directory to use instead of searching
    install_dir: Option<PathBuf>,
    /// Whether to resolve executable names through `PATH`
    use_path: bool,
    /// Value to use instead of the `PATH` environment variable
    path_var: Option<OsString>,
}

impl SearchPathDiscovery {
    /// Creates a discovery over `config`
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            install_dir: None,
            use_path: true,
            path_var: None,
        }
    }

    /// Creates a discovery over the table for the current platform
    pub fn for_current_platform() -> Result<Self, DiscoveryError> {
        PlatformConfig::current().map(|config| Self::new(config.clone()))
    }

    /// Uses `dir` as the install directory, skipping the search
    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Enables or disables the `PATH` fallback
    pub fn search_path(mut self, enabled: bool) -> Self {
        self.use_path = enabled;
        self
    }

    /// Searches `path_var` instead of the process' `PATH`
    pub fn path_var(mut self, path_var: impl Into<OsString>) -> Self {
        self.path_var = Some(path_var.into());
        self
    }

    /// Checks whether `dir` holds an install.
    ///
    /// Returns `Ok(None)` when no executable is present and an error when the executable is present without the library.
    fn inspect(&self, dir: &Path) -> Result<Option<Installation>, DiscoveryError> {
        trace!(dir = %dir.display(), "checking install candidate");

        let executable = self
            .config
            .executables
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file());
        let executable = match executable {
            Some(executable) => executable,
            None => return Ok(None),
        };

        let library = dir.join(&self.config.library);
        if !library.is_file() {
            return Err(DiscoveryError::LibraryMissing {
                dir: dir.to_path_buf(),
                library: self.config.library.clone(),
            });
        }

        Ok(Some(Installation {
            dir: dir.to_path_buf(),
            executable,
            library,
        }))
    }

    /// Install directories of every executable name found on `PATH`, symlinks resolved
    fn path_candidates(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        self.config
            .executables
            .iter()
            .filter_map(|name| {
                let found = match &self.path_var {
                    Some(paths) => which::which_in(name, Some(paths), &cwd),
                    None => which::which(name),
                };
                let found = found.ok()?;
                trace!(name = %name, path = %found.display(), "found executable on PATH");
                let resolved = fs::canonicalize(&found).ok()?;
                resolved.parent().map(Path::to_path_buf)
            })
            .collect()
    }
}

impl ExecutableDiscovery for SearchPathDiscovery {
    fn discover(&self) -> Result<Installation, DiscoveryError> {
        if let Some(dir) = &self.install_dir {
            if !dir.is_dir() {
                return Err(DiscoveryError::InvalidOverride(dir.clone()));
            }
            return self.inspect(dir)?.ok_or_else(|| DiscoveryError::NotFound {
                searched: vec![dir.clone()],
            });
        }

        let mut candidates = self.config.search_dirs.clone();
        if self.use_path {
            candidates.extend(self.path_candidates());
        }

        let mut incomplete = None;
        for dir in &candidates {
            match self.inspect(dir) {
                Ok(Some(installation)) => {
                    debug!(dir = %installation.dir.display(), "found browser install");
                    return Ok(installation);
                }
                Ok(None) => {}
                Err(e) => {
                    trace!(dir = %dir.display(), error = %e, "skipping incomplete install");
                    incomplete.get_or_insert(e);
                }
            }
        }

        Err(incomplete.unwrap_or(DiscoveryError::NotFound {
            searched: candidates,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::discovery::{
        DiscoveryError, ExecutableDiscovery, PlatformConfig, SearchPathDiscovery,
    };

    /// Creates an install in `dir` with the given files
    fn install(dir: &Path, files: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"").unwrap();
        }
    }

    /// Config searching the given directories
    fn config<P: AsRef<Path>>(dirs: &[P]) -> PlatformConfig {
        PlatformConfig {
            executables: vec!["firefox".to_owned(), "firefox-bin".to_owned()],
            search_dirs: dirs.iter().map(|d| d.as_ref().to_path_buf()).collect(),
            library: "libxul.so".to_owned(),
        }
    }

    #[test]
    /// The first search directory holding an install wins
    fn test_search_order() {
        let root = tempfile::tempdir().unwrap();
        let empty = root.path().join("empty");
        let first = root.path().join("first");
        let second = root.path().join("second");
        fs::create_dir_all(&empty).unwrap();
        install(&first, &["firefox-bin", "libxul.so"]);
        install(&second, &["firefox", "libxul.so"]);

        let discovery =
            SearchPathDiscovery::new(config(&[&empty, &first, &second])).search_path(false);
        let installation = discovery.discover().unwrap();
        assert_eq!(installation.dir, first);
        assert_eq!(installation.executable, first.join("firefox-bin"));
        assert_eq!(installation.library, first.join("libxul.so"));
    }

    #[test]
    /// An install without its library is skipped, but reported if nothing better turns up
    fn test_library_missing() {
        let root = tempfile::tempdir().unwrap();
        let broken = root.path().join("broken");
        let good = root.path().join("good");
        install(&broken, &["firefox"]);
        install(&good, &["firefox", "libxul.so"]);

        let discovery = SearchPathDiscovery::new(config(&[&broken, &good])).search_path(false);
        assert_eq!(discovery.discover().unwrap().dir, good);

        let discovery = SearchPathDiscovery::new(config(&[&broken])).search_path(false);
        assert!(matches!(
            discovery.discover(),
            Err(DiscoveryError::LibraryMissing { .. })
        ));
    }

    #[test]
    /// An explicit directory bypasses the search and must exist
    fn test_override() {
        let root = tempfile::tempdir().unwrap();
        let custom = root.path().join("custom");
        install(&custom, &["firefox", "libxul.so"]);

        let discovery = SearchPathDiscovery::new(config::<&Path>(&[])).install_dir(&custom);
        assert_eq!(discovery.discover().unwrap().dir, custom);

        let missing = root.path().join("missing");
        let discovery = SearchPathDiscovery::new(config(&[&custom])).install_dir(&missing);
        assert!(matches!(
            discovery.discover(),
            Err(DiscoveryError::InvalidOverride(p)) if p == missing
        ));
    }

    #[test]
    /// Nothing found lists what was searched
    fn test_not_found() {
        let root = tempfile::tempdir().unwrap();
        let discovery = SearchPathDiscovery::new(config(&[root.path()])).search_path(false);
        match discovery.discover() {
            Err(DiscoveryError::NotFound { searched }) => assert_eq!(searched, [root.path()]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    /// Executables on `PATH` resolve through symlinks to their install directory
    fn test_path_lookup() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let root = tempfile::tempdir().unwrap();
        let lib = root.path().join("lib").join("firefox");
        let bin = root.path().join("bin");
        install(&lib, &["firefox", "libxul.so"]);
        fs::set_permissions(lib.join("firefox"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir_all(&bin).unwrap();
        symlink(lib.join("firefox"), bin.join("firefox")).unwrap();

        let discovery = SearchPathDiscovery::new(config::<&Path>(&[])).path_var(bin.as_os_str());
        let installation = discovery.discover().unwrap();
        assert_eq!(installation.dir, fs::canonicalize(&lib).unwrap());
    }
}
