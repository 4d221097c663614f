//! # gardenia-sync
//!
//! Synchronization engine: keeps installed bundles at the tip of their
//! primary branch.
//!
//! Call [`pipeline::run`] (or [`pipeline::run_blocking`]) with a
//! [`SyncConfig`](gardenia_core::SyncConfig) and the declared bundles to run
//! one full pass and get a [`SyncReport`].

pub mod archive;
pub mod cleaner;
pub mod coordinator;
pub mod error;
pub mod hosting;
pub mod installer;
pub mod pipeline;
pub mod version_store;

pub use coordinator::{BundleOutcome, BundleStatus};
pub use error::{BundleError, FetchError, InstallError, ResolutionError, SyncError, UnpackError};
pub use hosting::{ArchiveFetcher, Branch, BranchCommit, BranchResolver, HostClient};
pub use pipeline::SyncReport;
