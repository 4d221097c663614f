//! Run configuration and filesystem layout.
//!
//! # Layout
//!
//! ```text
//! <install_root>/
//!   gardenia.json            (declaration)
//!   <subdir>/<repo>/         (one directory per installed bundle)
//! <cache_dir>/
//!   installed.json           (version record)
//!   archives/                (download + unpack staging area)
//! ```
//!
//! Helpers taking an explicit `home` follow the `_at` convention so tests can
//! point them at a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::manifest::MANIFEST_FILE;

pub const DEFAULT_PRIMARY_BRANCH: &str = "master";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_ARCHIVE_BASE: &str = "https://github.com";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

pub const VERSION_FILE: &str = "installed.json";
pub const ARCHIVES_DIR: &str = "archives";

/// Immutable configuration for one synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root under which bundle subdirectories are created.
    pub install_root: PathBuf,
    /// Holds the version record and the staging area.
    pub cache_dir: PathBuf,
    /// Report what would change; touch nothing.
    pub list_only: bool,
    /// Discard the version record before loading it.
    pub force: bool,
    /// Remove installs that are no longer declared.
    pub clean: bool,
    /// Upper bound on bundles processed at the same time.
    pub max_in_flight: usize,
    pub primary_branch: String,
    pub api_base: String,
    pub archive_base: String,
}

impl SyncConfig {
    pub fn new(install_root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            cache_dir: cache_dir.into(),
            list_only: false,
            force: false,
            clean: false,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            primary_branch: DEFAULT_PRIMARY_BRANCH.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            archive_base: DEFAULT_ARCHIVE_BASE.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// `<cache_dir>/installed.json`
    pub fn version_file(&self) -> PathBuf {
        self.cache_dir.join(VERSION_FILE)
    }

    /// `<cache_dir>/archives`
    pub fn archives_dir(&self) -> PathBuf {
        self.cache_dir.join(ARCHIVES_DIR)
    }

    /// `<install_root>/gardenia.json`
    pub fn manifest_file(&self) -> PathBuf {
        self.install_root.join(MANIFEST_FILE)
    }
}

/// Default install root: `~/.vim`, or `~/vimfiles` on Windows.
pub fn default_install_root_at(home: &Path) -> PathBuf {
    if cfg!(windows) {
        home.join("vimfiles")
    } else {
        home.join(".vim")
    }
}

/// Default cache directory: `~/.cache/gardenia`.
pub fn default_cache_dir_at(home: &Path) -> PathBuf {
    home.join(".cache").join("gardenia")
}

/// Expand a leading `~` against `home`. Other paths are returned unchanged.
pub fn expand_tilde_at(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolve the home directory via `dirs::home_dir()`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
