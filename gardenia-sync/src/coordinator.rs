//! Concurrent per-bundle synchronization.
//!
//! Every desired bundle gets its own task. A semaphore bounds how many run
//! their blocking resolve → fetch → unpack → install sequence at once, and
//! every task reports one [`BundleOutcome`] over a shared channel. The new
//! version store is the union of the records carried by those outcomes.
//!
//! Per bundle:
//! 1. Resolve the primary branch tip.
//! 2. Look up the previous record; ignore it if its marker is empty or the
//!    install directory is gone.
//! 3. Same marker → `UpToDate`, keep the previous record.
//! 4. List-only → `WouldInstall`, no record.
//! 5. Fetch, unpack, install → `Installed` with the new record.
//!
//! Any failure yields `Failed` and no record.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Semaphore};

use gardenia_core::{
    BundleDescriptor, BundleId, CommitMarker, InstallRecord, SyncConfig, VersionStore,
};

use crate::archive::{locate_snapshot, unpack};
use crate::error::{BundleError, UnpackError};
use crate::hosting::{find_branch, ArchiveFetcher, BranchResolver};
use crate::installer::{install, remove_path};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one bundle during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BundleStatus {
    /// Installed marker matches the branch tip; nothing fetched.
    UpToDate { record: InstallRecord },
    /// Fetched and installed at the branch tip.
    Installed { record: InstallRecord },
    /// List-only mode: an install is needed but was not performed.
    WouldInstall { marker: CommitMarker },
    /// Processing stopped at `stage`.
    Failed { stage: String, message: String },
}

/// Per-bundle result reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleOutcome {
    pub id: BundleId,
    pub subdir: String,
    #[serde(flatten)]
    pub status: BundleStatus,
}

impl BundleOutcome {
    /// The record this outcome contributes to the new version store.
    pub fn record(&self) -> Option<&InstallRecord> {
        match &self.status {
            BundleStatus::UpToDate { record } | BundleStatus::Installed { record } => Some(record),
            BundleStatus::WouldInstall { .. } | BundleStatus::Failed { .. } => None,
        }
    }
}

/// Build the next version store from a pass's outcomes.
///
/// Bundles that failed or were only listed are absent.
pub fn collect_store(outcomes: &[BundleOutcome]) -> VersionStore {
    outcomes
        .iter()
        .filter_map(|o| o.record().map(|r| (o.id.clone(), r.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Per-bundle name for the archive file and unpack directory.
///
/// Includes a digest of the subdirectory so the same repository declared
/// twice never shares a staging path.
pub fn staging_key(bundle: &BundleDescriptor) -> String {
    let digest = hex::encode(Sha256::digest(bundle.install_subdir.as_bytes()));
    format!("{}_{}-{}", bundle.owner, bundle.repo, &digest[..8])
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Synchronize every bundle concurrently and return one outcome per bundle.
///
/// Outcomes arrive in completion order.
pub async fn synchronize<H>(
    host: Arc<H>,
    config: Arc<SyncConfig>,
    bundles: Vec<BundleDescriptor>,
    previous: Arc<VersionStore>,
) -> Vec<BundleOutcome>
where
    H: BranchResolver + ArchiveFetcher + 'static,
{
    if bundles.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let (tx, mut rx) = mpsc::channel::<BundleOutcome>(bundles.len());

    for bundle in bundles {
        let host = Arc::clone(&host);
        let config = Arc::clone(&config);
        let previous = Arc::clone(&previous);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let id = bundle.id();
            let subdir = bundle.install_subdir.clone();

            let result = match semaphore.acquire_owned().await {
                Ok(permit) => tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let prev = previous.get(&bundle.id());
                    process_bundle(host.as_ref(), &config, &bundle, prev)
                })
                .await
                .unwrap_or_else(|join| Err(BundleError::Worker(join.to_string()))),
                Err(_) => Err(BundleError::Worker("semaphore closed".to_string())),
            };

            let status = match result {
                Ok(status) => status,
                Err(err) => {
                    tracing::debug!("[{id}] {} failed: {err}", err.stage());
                    BundleStatus::Failed {
                        stage: err.stage().to_string(),
                        message: err.to_string(),
                    }
                }
            };

            let _ = tx.send(BundleOutcome { id, subdir, status }).await;
        });
    }
    drop(tx);

    let mut outcomes = Vec::new();
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }
    outcomes
}

// ---------------------------------------------------------------------------
// Per-bundle pipeline (blocking)
// ---------------------------------------------------------------------------

/// Run the decision rule and, if needed, the install for one bundle.
pub fn process_bundle<H>(
    host: &H,
    config: &SyncConfig,
    bundle: &BundleDescriptor,
    previous: Option<&InstallRecord>,
) -> Result<BundleStatus, BundleError>
where
    H: BranchResolver + ArchiveFetcher + ?Sized,
{
    let branches = host.list_branches(&bundle.owner, &bundle.repo)?;
    let marker = find_branch(&branches, &config.primary_branch)
        .cloned()
        .ok_or_else(|| BundleError::BranchNotFound {
            branch: config.primary_branch.clone(),
        })?;

    let dest = bundle.destination(&config.install_root);
    let current = previous.filter(|r| !r.marker.is_empty() && dest.exists());
    if let Some(record) = current {
        if record.marker == marker {
            tracing::debug!("[{bundle}] up to date at {marker}");
            return Ok(BundleStatus::UpToDate {
                record: record.clone(),
            });
        }
    }

    if config.list_only {
        tracing::info!("[list] would install {bundle} at {marker}");
        return Ok(BundleStatus::WouldInstall { marker });
    }

    let archives = config.archives_dir();
    let key = staging_key(bundle);
    let archive = archives.join(format!("{key}.zip"));
    let unpack_dir = archives.join(&key);
    remove_path(&unpack_dir).map_err(|source| UnpackError::Write {
        path: unpack_dir.clone(),
        source,
    })?;

    let result = fetch_and_install(host, bundle, &marker, &archive, &unpack_dir, &dest);

    for leftover in [&archive, &unpack_dir] {
        if let Err(e) = remove_path(leftover) {
            tracing::warn!("could not remove {}: {e}", leftover.display());
        }
    }
    result?;

    tracing::info!("installed {bundle} at {marker}");
    Ok(BundleStatus::Installed {
        record: InstallRecord::new(bundle.install_subdir.clone(), marker),
    })
}

fn fetch_and_install<H>(
    host: &H,
    bundle: &BundleDescriptor,
    marker: &CommitMarker,
    archive: &Path,
    unpack_dir: &Path,
    dest: &Path,
) -> Result<(), BundleError>
where
    H: ArchiveFetcher + ?Sized,
{
    host.fetch(&bundle.owner, &bundle.repo, marker, archive)?;
    unpack(archive, unpack_dir)?;
    let snapshot = locate_snapshot(unpack_dir, &bundle.repo, marker)?;
    install(&snapshot, dest)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(owner_repo: &str, subdir: &str) -> BundleDescriptor {
        BundleDescriptor::parse(owner_repo, subdir).unwrap()
    }

    #[test]
    fn staging_key_differs_per_subdir() {
        let a = staging_key(&bundle("o/r", "x"));
        let b = staging_key(&bundle("o/r", "y"));
        assert_ne!(a, b);
        assert!(a.starts_with("o_r-"), "{a}");
        assert_eq!(a, staging_key(&bundle("o/r", "x")), "key must be stable");
    }

    #[test]
    fn collect_store_keeps_only_recorded_outcomes() {
        let rec = InstallRecord::new("b", CommitMarker::from("1"));
        let outcomes = vec![
            BundleOutcome {
                id: BundleId::from("o/up"),
                subdir: "b".into(),
                status: BundleStatus::UpToDate { record: rec.clone() },
            },
            BundleOutcome {
                id: BundleId::from("o/new"),
                subdir: "b".into(),
                status: BundleStatus::Installed { record: rec.clone() },
            },
            BundleOutcome {
                id: BundleId::from("o/list"),
                subdir: "b".into(),
                status: BundleStatus::WouldInstall { marker: CommitMarker::from("2") },
            },
            BundleOutcome {
                id: BundleId::from("o/bad"),
                subdir: "b".into(),
                status: BundleStatus::Failed {
                    stage: "fetch".into(),
                    message: "boom".into(),
                },
            },
        ];
        let store = collect_store(&outcomes);
        let keys: Vec<_> = store.keys().map(|k| k.0.as_str()).collect();
        assert_eq!(keys, vec!["o/new", "o/up"]);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = BundleOutcome {
            id: BundleId::from("o/r"),
            subdir: "bundle".into(),
            status: BundleStatus::Failed {
                stage: "resolve".into(),
                message: "master branch not found".into(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["id"], "o/r");
        assert_eq!(json["stage"], "resolve");
    }
}
