//! Error types for gardenia-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading the bundle declaration.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The declaration file could not be read.
    #[error("cannot read declaration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load, with the file path for context.
    #[error("failed to parse declaration at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse error on load, with the file path for context.
    #[error("failed to parse declaration at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A leaf was not of the form `owner/repo`.
    #[error("{value}: plugin should be style of :owner/:repo (under '{subdir}')")]
    InvalidBundle { value: String, subdir: String },

    /// A group key was empty or tried to leave the install root.
    #[error("invalid directory key '{key}' under '{subdir}'")]
    InvalidKey { key: String, subdir: String },
}

/// Errors resolving the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// `max_in_flight` must allow at least one bundle.
    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,
}
