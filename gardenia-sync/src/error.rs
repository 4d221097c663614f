//! Error types for gardenia-sync.
//!
//! [`SyncError`] aborts the whole pass. [`BundleError`] is confined to one
//! bundle: it is reported and the pass carries on.

use std::path::PathBuf;

use thiserror::Error;

use gardenia_core::{ConfigError, ManifestError};

/// Errors that abort a synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Version-record file could not be parsed.
    #[error("failed to parse version record at {path}: {source}")]
    StoreParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (version record).
    #[error("version record JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("declaration error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The install root does not exist.
    #[error("install root not found at {path}")]
    InstallRootMissing { path: PathBuf },

    /// A stored identity is not of the form `owner/repo`.
    #[error("{id}: plugin should be style of :owner/:repo")]
    InvalidStoredId { id: String },

    /// A stored subdirectory would resolve outside the install root.
    #[error("{id}: stored install directory '{subdir}' is outside the install root")]
    InvalidStoredSubdir { id: String, subdir: String },

    /// Failure removing an undeclared install during the clean step.
    #[error("failed to remove {path}: {source}")]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("async runtime error: {0}")]
    Runtime(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Per-bundle errors
// ---------------------------------------------------------------------------

/// Branch listing failed.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("cannot decode branch list from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Archive download failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("cannot write archive to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Archive extraction failed.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("cannot open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed archive {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Entry name is absolute or climbs out of the output directory.
    #[error("archive entry '{entry}' escapes the output directory")]
    UnsafePath { entry: String },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no snapshot directory found in {path}")]
    SnapshotNotFound { path: PathBuf },
}

/// Replacing the install directory failed.
#[derive(Debug, Error)]
#[error("cannot install to {path}: {source}")]
pub struct InstallError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub(crate) fn install_err(path: impl Into<PathBuf>, source: std::io::Error) -> InstallError {
    InstallError {
        path: path.into(),
        source,
    }
}

/// Everything that can go wrong while processing a single bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{branch} branch not found")]
    BranchNotFound { branch: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error(transparent)]
    Install(#[from] InstallError),

    /// The worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl BundleError {
    /// Short name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            BundleError::Resolution(_) | BundleError::BranchNotFound { .. } => "resolve",
            BundleError::Fetch(_) => "fetch",
            BundleError::Unpack(_) => "unpack",
            BundleError::Install(_) => "install",
            BundleError::Worker(_) => "worker",
        }
    }
}
