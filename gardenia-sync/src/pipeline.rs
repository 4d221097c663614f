//! Synchronization pass entrypoint.
//!
//! A pass runs in this order:
//!
//! 1. Check the install root; create the cache and staging directories.
//! 2. Load the version record (discarding it first in force mode).
//! 3. Clean undeclared installs when requested.
//! 4. Synchronize every declared bundle concurrently.
//! 5. Persist the new version record (never in list-only mode).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gardenia_core::{BundleDescriptor, SyncConfig, VersionStore};

use crate::cleaner::{self, Removal};
use crate::coordinator::{self, BundleOutcome, BundleStatus};
use crate::error::{io_err, SyncError};
use crate::hosting::{ArchiveFetcher, BranchResolver, HostClient};
use crate::version_store;

/// Summary of one synchronization pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub list_only: bool,
    pub removed: Vec<Removal>,
    /// Sorted by bundle identity, then subdirectory.
    pub bundles: Vec<BundleOutcome>,
}

impl SyncReport {
    pub fn installed(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::Installed { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::UpToDate { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::WouldInstall { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, BundleStatus::Failed { .. }))
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    fn count(&self, pred: impl Fn(&BundleStatus) -> bool) -> usize {
        self.bundles.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Validate the configuration and create the cache layout.
pub fn prepare(config: &SyncConfig) -> Result<(), SyncError> {
    config.validate()?;
    if !config.install_root.is_dir() {
        return Err(SyncError::InstallRootMissing {
            path: config.install_root.clone(),
        });
    }
    let archives = config.archives_dir();
    std::fs::create_dir_all(&archives).map_err(|e| io_err(&archives, e))?;
    Ok(())
}

/// Load the previous version record according to the run mode.
///
/// Force mode deletes the record file, except in list-only mode where it is
/// ignored in memory instead.
pub fn load_previous(config: &SyncConfig) -> Result<VersionStore, SyncError> {
    let path = config.version_file();
    if config.force {
        if config.list_only {
            return Ok(VersionStore::new());
        }
        version_store::clear_at(&path)?;
    }
    version_store::load_at(&path)
}

/// Run one pass against an explicit hosting client.
pub async fn run_with<H>(
    config: SyncConfig,
    bundles: Vec<BundleDescriptor>,
    host: Arc<H>,
) -> Result<SyncReport, SyncError>
where
    H: BranchResolver + ArchiveFetcher + 'static,
{
    let started_at = Utc::now();
    prepare(&config)?;
    let previous = load_previous(&config)?;

    let removed = if config.clean {
        cleaner::clean(&config.install_root, &bundles, &previous, config.list_only)?
    } else {
        Vec::new()
    };

    let list_only = config.list_only;
    let version_file = config.version_file();
    let mut outcomes = coordinator::synchronize(
        host,
        Arc::new(config),
        bundles,
        Arc::new(previous),
    )
    .await;

    if !list_only {
        let store = coordinator::collect_store(&outcomes);
        version_store::save_at(&version_file, &store)?;
    }

    outcomes.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.subdir.cmp(&b.subdir)));
    Ok(SyncReport {
        started_at,
        finished_at: Utc::now(),
        list_only,
        removed,
        bundles: outcomes,
    })
}

/// Run one pass against the configured hosting service.
pub async fn run(
    config: SyncConfig,
    bundles: Vec<BundleDescriptor>,
) -> Result<SyncReport, SyncError> {
    let host = Arc::new(HostClient::from_config(&config));
    run_with(config, bundles, host).await
}

/// Build a runtime and block the current thread on [`run`].
pub fn run_blocking(
    config: SyncConfig,
    bundles: Vec<BundleDescriptor>,
) -> Result<SyncReport, SyncError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| SyncError::Runtime(e.to_string()))?;
    runtime.block_on(run(config, bundles))
}
