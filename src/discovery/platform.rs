//! Per-platform tables of browser executable names, install locations and marker libraries

use std::env;
use std::path::PathBuf;

use lazy_static::lazy_static;

use super::DiscoveryError;

/// Where to look for a browser install on one operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// File names of the browser executable, in order of preference
    pub executables: Vec<String>,
    /// Directories that commonly hold an install, in order of preference
    pub search_dirs: Vec<PathBuf>,
    /// File name of the library carrying the marker, relative to the install directory
    pub library: String,
}

impl PlatformConfig {
    /// Builds a config, expanding `~` and `%VAR%` in search directories and dropping ones that can't be expanded
    pub fn new(executables: &[&str], search_dirs: &[&str], library: &str) -> Self {
        Self {
            executables: executables.iter().map(|s| s.to_string()).collect(),
            search_dirs: search_dirs.iter().filter_map(|s| expand(s)).collect(),
            library: library.to_owned(),
        }
    }

    /// Config for the platform this crate was compiled for
    pub fn current() -> Result<&'static PlatformConfig, DiscoveryError> {
        if cfg!(target_os = "linux") {
            Ok(&*LINUX)
        } else if cfg!(target_os = "macos") {
            Ok(&*MACOS)
        } else if cfg!(target_os = "windows") {
            Ok(&*WINDOWS)
        } else {
            Err(DiscoveryError::UnsupportedPlatform(env::consts::OS.to_owned()))
        }
    }
}

/// Expands a leading `~/` to the home directory and a leading `%VAR%` to its environment value
fn expand(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if let Some(rest) = path.strip_prefix('%') {
        let (var, rest) = rest.split_once('%')?;
        let value = env::var_os(var)?;
        let rest = rest.trim_start_matches(['\\', '/']);
        return Some(PathBuf::from(value).join(rest));
    }
    Some(PathBuf::from(path))
}

lazy_static! {
    /// Linux installs, including distro packages, snap and flatpak
    pub static ref LINUX: PlatformConfig = PlatformConfig::new(
        &["firefox", "firefox-bin", "firefox-esr"],
        &[
            "/usr/lib/firefox",
            "/usr/lib/firefox-esr",
            "/usr/lib/firefox-developer-edition",
            "/usr/lib/firefox-nightly",
            "/usr/lib/firefox-trunk",
            "/usr/lib/firefox-beta",
            "/snap/firefox/current/usr/lib/firefox",
            "/opt/firefox",
            "/usr/lib64/firefox",
            "/usr/local/firefox",
            "/usr/lib/x86_64-linux-gnu/firefox",
            "~/.local/share/flatpak/app/org.mozilla.firefox",
            "/var/lib/flatpak/app/org.mozilla.firefox",
        ],
        "libxul.so",
    );

    /// macOS app bundles plus Homebrew and MacPorts prefixes
    pub static ref MACOS: PlatformConfig = PlatformConfig::new(
        &["firefox", "Firefox", "firefox-bin"],
        &[
            "/Applications/Firefox.app/Contents/MacOS",
            "/Applications/Firefox Developer Edition.app/Contents/MacOS",
            "/Applications/Firefox Nightly.app/Contents/MacOS",
            "~/Applications/Firefox.app/Contents/MacOS",
            "~/Applications/Firefox Developer Edition.app/Contents/MacOS",
            "~/Applications/Firefox Nightly.app/Contents/MacOS",
            "/opt/homebrew/bin",
            "/usr/local/bin",
            "/opt/local/bin",
        ],
        "XUL",
    );

    /// Windows per-machine and per-user installs
    pub static ref WINDOWS: PlatformConfig = PlatformConfig::new(
        &["firefox.exe"],
        &[
            "C:\\Program Files\\Mozilla Firefox",
            "C:\\Program Files (x86)\\Mozilla Firefox",
            "%LOCALAPPDATA%\\Mozilla Firefox",
            "%PROGRAMFILES%\\Mozilla Firefox",
            "%PROGRAMFILES(X86)%\\Mozilla Firefox",
        ],
        "xul.dll",
    );
}
