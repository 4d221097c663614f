//! Domain types for bundle synchronization.
//!
//! A bundle is identified by its `owner/repo` pair ([`BundleId`]) for version
//! lookup, and by `(BundleId, install_subdir)` for cleanup decisions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Bundle identity in `owner/repo` form. Key of the version store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub String);

impl BundleId {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self(format!("{owner}/{repo}"))
    }

    /// Split into `(owner, repo)`. `None` unless the identity contains exactly
    /// one `/` with a non-empty component on each side.
    pub fn split(&self) -> Option<(&str, &str)> {
        let (owner, repo) = self.0.split_once('/')?;
        if !is_plain_component(owner) || !is_plain_component(repo) || repo.contains('/') {
            return None;
        }
        Some((owner, repo))
    }

    /// The repository half of the identity, i.e. the install directory name.
    pub fn repo_name(&self) -> Option<&str> {
        self.split().map(|(_, repo)| repo)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BundleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BundleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque identifier of a point in a bundle's upstream history.
///
/// Only equality is meaningful. An empty marker means "not installed".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitMarker(pub String);

impl CommitMarker {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitMarker {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitMarker {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Last known installed state of a bundle.
///
/// Field names match the on-disk version-record format (`Dir` / `SHA`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallRecord {
    #[serde(rename = "Dir")]
    pub subdir: String,
    #[serde(rename = "SHA")]
    pub marker: CommitMarker,
}

impl InstallRecord {
    pub fn new(subdir: impl Into<String>, marker: CommitMarker) -> Self {
        Self {
            subdir: subdir.into(),
            marker,
        }
    }
}

/// Mapping from bundle identity to its install record.
///
/// A `BTreeMap` so the persisted file is stable across identical passes.
pub type VersionStore = BTreeMap<BundleId, InstallRecord>;

/// One desired bundle, as declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleDescriptor {
    /// Subdirectory of the install root, `/`-separated, possibly empty.
    pub install_subdir: String,
    pub owner: String,
    pub repo: String,
}

impl BundleDescriptor {
    /// Parse an `owner/repo` leaf declared under `install_subdir`.
    pub fn parse(owner_repo: &str, install_subdir: &str) -> Result<Self, ManifestError> {
        let id = BundleId::from(owner_repo);
        let Some((owner, repo)) = id.split() else {
            return Err(ManifestError::InvalidBundle {
                value: owner_repo.to_string(),
                subdir: install_subdir.to_string(),
            });
        };
        Ok(Self {
            install_subdir: install_subdir.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn id(&self) -> BundleId {
        BundleId::new(&self.owner, &self.repo)
    }

    /// `<install_root>/<install_subdir>/<repo>`
    pub fn destination(&self, install_root: &Path) -> PathBuf {
        install_dir(install_root, &self.install_subdir, &self.repo)
    }
}

impl fmt::Display for BundleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Join a `/`-separated subdirectory and a repo name onto the install root.
pub fn install_dir(install_root: &Path, subdir: &str, repo: &str) -> PathBuf {
    let mut path = install_root.to_path_buf();
    for part in subdir.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.join(repo)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// A single path segment that stays where it is joined.
fn is_plain_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains('\\')
}

/// Whether a stored install subdirectory stays inside the install root.
///
/// The empty string is the root itself.
pub fn is_safe_subdir(subdir: &str) -> bool {
    subdir.is_empty() || subdir.split('/').all(is_plain_component)
}
