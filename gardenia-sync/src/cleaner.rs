//! Removal of installs that are no longer declared.
//!
//! A stored bundle is kept only when some desired bundle has the same
//! identity *and* the same subdirectory. Moving a bundle to another
//! subdirectory therefore removes the old location; the sync pass then
//! installs it fresh at the new one.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use gardenia_core::types::{install_dir, is_safe_subdir};
use gardenia_core::{BundleDescriptor, BundleId, VersionStore};

use crate::error::SyncError;
use crate::installer::remove_path;

/// A stored install that is not declared any more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub id: BundleId,
    pub path: PathBuf,
    /// `false` in list-only mode.
    pub removed: bool,
}

/// Remove every stored install without a matching desired bundle.
///
/// With `dry_run` nothing is touched; the would-be removals are returned.
/// Removal failures abort the clean step.
pub fn clean(
    install_root: &Path,
    desired: &[BundleDescriptor],
    previous: &VersionStore,
    dry_run: bool,
) -> Result<Vec<Removal>, SyncError> {
    let declared: HashSet<(BundleId, &str)> = desired
        .iter()
        .map(|b| (b.id(), b.install_subdir.as_str()))
        .collect();

    let mut removals = Vec::new();
    for (id, record) in previous {
        if declared.contains(&(id.clone(), record.subdir.as_str())) {
            continue;
        }
        let Some(repo) = id.repo_name() else {
            return Err(SyncError::InvalidStoredId { id: id.0.clone() });
        };
        if !is_safe_subdir(&record.subdir) {
            return Err(SyncError::InvalidStoredSubdir {
                id: id.0.clone(),
                subdir: record.subdir.clone(),
            });
        }
        let path = install_dir(install_root, &record.subdir, repo);

        if dry_run {
            tracing::info!("[list] would remove {id} at {}", path.display());
        } else {
            remove_path(&path).map_err(|source| SyncError::Clean {
                path: path.clone(),
                source,
            })?;
            prune_empty_parents(&path, install_root).map_err(|(path, source)| {
                SyncError::Clean { path, source }
            })?;
            tracing::info!("removed {id} from {}", path.display());
        }

        removals.push(Removal {
            id: id.clone(),
            path,
            removed: !dry_run,
        });
    }
    Ok(removals)
}

/// Remove now-empty ancestors of `removed`, stopping at `root`.
fn prune_empty_parents(removed: &Path, root: &Path) -> Result<(), (PathBuf, io::Error)> {
    let mut current = removed.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match std::fs::remove_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Not empty (the error kind for this varies by platform).
            Err(_) if dir.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) => break,
            Err(e) => return Err((dir.to_path_buf(), e)),
        }
        current = dir.parent();
    }
    Ok(())
}
