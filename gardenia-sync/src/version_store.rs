//! Version store — which commit of each bundle is installed where.
//!
//! Persists a flat JSON document at `<cache_dir>/installed.json`:
//!
//! ```json
//! {
//!   "tpope/vim-fugitive": { "Dir": "pack/tools/start", "SHA": "0a1b2c…" }
//! }
//! ```
//!
//! Writes go to `installed.json.tmp` and are renamed into place, so a reader
//! never sees a partially written record.

use std::path::Path;

use gardenia_core::VersionStore;

use crate::error::{io_err, SyncError};

/// Load the version record at `path`.
///
/// Returns an empty store if the file does not yet exist.
pub fn load_at(path: &Path) -> Result<VersionStore, SyncError> {
    if !path.exists() {
        return Ok(VersionStore::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| SyncError::StoreParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save the version record atomically.
pub fn save_at(path: &Path, store: &VersionStore) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid version record path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Delete the version record, if present. Used by force mode.
pub fn clear_at(path: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}
