//! Gardenia core library — bundle types, declaration loading, run config.
//!
//! - [`types`] — identities, commit markers, install records
//! - [`manifest`] — declaration tree and flattening
//! - [`config`] — [`SyncConfig`] and default paths
//! - [`error`] — [`ManifestError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::SyncConfig;
pub use error::{ConfigError, ManifestError};
pub use manifest::DeclNode;
pub use types::{BundleDescriptor, BundleId, CommitMarker, InstallRecord, VersionStore};
