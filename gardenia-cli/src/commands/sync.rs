//! `gardenia` — run one synchronization pass.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use gardenia_core::{config, manifest, SyncConfig};
use gardenia_sync::{pipeline, BundleStatus, SyncReport};

/// Arguments for a synchronization pass.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Cache directory path (default: ~/.cache/gardenia).
    #[arg(short = 'c', long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Clean not managed plugins.
    #[arg(short = 'e', long)]
    pub clean: bool,

    /// Force reinstall plugins.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Only list plugins to install; change nothing.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Maximum number of bundles processed at once.
    #[arg(
        short = 'j',
        long,
        value_name = "N",
        default_value_t = config::DEFAULT_MAX_IN_FLIGHT,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
    )]
    pub jobs: usize,

    /// Install root (default: ~/.vim, or ~/vimfiles on Windows).
    #[arg(long, value_name = "PATH")]
    pub install_root: Option<PathBuf>,

    /// Declaration file (default: <install root>/gardenia.json).
    #[arg(long = "config", value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Branch whose tip is installed.
    #[arg(long, value_name = "NAME", default_value = config::DEFAULT_PRIMARY_BRANCH)]
    pub branch: String,

    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Hosting API base URL.
    #[arg(long, value_name = "URL", hide = true)]
    pub api_base: Option<String>,

    /// Archive download base URL.
    #[arg(long, value_name = "URL", hide = true)]
    pub archive_base: Option<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = config::home().context("could not determine home directory")?;

        let install_root = match &self.install_root {
            Some(path) => config::expand_tilde_at(path, &home),
            None => config::default_install_root_at(&home),
        };
        if !install_root.is_dir() {
            anyhow::bail!("install root {} does not exist", install_root.display());
        }

        let cache_dir = match &self.cache_dir {
            Some(path) => config::expand_tilde_at(path, &home),
            None => config::default_cache_dir_at(&home),
        };
        let mut sync_config = SyncConfig::new(install_root, cache_dir);
        sync_config.clean = self.clean;
        sync_config.force = self.force;
        sync_config.list_only = self.list;
        sync_config.max_in_flight = self.jobs;
        sync_config.primary_branch = self.branch.clone();
        if let Some(base) = &self.api_base {
            sync_config.api_base = base.clone();
        }
        if let Some(base) = &self.archive_base {
            sync_config.archive_base = base.clone();
        }

        let manifest_path = self
            .manifest
            .as_deref()
            .map(|p| config::expand_tilde_at(p, &home))
            .unwrap_or_else(|| sync_config.manifest_file());
        let bundles = manifest::load(&manifest_path)
            .with_context(|| format!("cannot load bundles from {}", manifest_path.display()))?;
        tracing::info!(
            "{} bundle(s) declared in {}",
            bundles.len(),
            manifest_path.display()
        );

        let report = pipeline::run_blocking(sync_config, bundles).context("sync failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    for removal in &report.removed {
        if removal.removed {
            println!("{} {}", "removed".yellow(), removal.id);
        } else {
            println!("[list] would remove {}", removal.id);
        }
    }

    for outcome in &report.bundles {
        match &outcome.status {
            BundleStatus::Installed { .. } => println!("{} {}", "installed".green(), outcome.id),
            BundleStatus::WouldInstall { .. } => println!("{}", outcome.id),
            BundleStatus::Failed { stage, message } => {
                eprintln!("{} [{}] {stage}: {message}", "error".red(), outcome.id)
            }
            BundleStatus::UpToDate { .. } => {}
        }
    }

    if report.list_only {
        println!(
            "[list] {} to install, {} up to date, {} failed",
            report.pending(),
            report.up_to_date(),
            report.failed()
        );
    } else {
        println!(
            "✓ {} installed, {} up to date, {} failed ({} ms)",
            report.installed(),
            report.up_to_date(),
            report.failed(),
            report.duration_ms()
        );
    }
}
