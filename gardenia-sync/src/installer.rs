//! Directory replacement for installed bundles.
//!
//! ## `install` — stage-then-swap
//!
//! 1. Move the staged snapshot next to the destination as `.<name>.gardenia-new`
//!    (rename; copy + remove when staging is on another filesystem).
//! 2. Rename an existing destination aside to `.<name>.gardenia-old`.
//! 3. Rename `.gardenia-new` to the destination. On failure put the old tree back.
//! 4. Remove `.gardenia-old`.
//!
//! The destination is missing only between steps 2 and 3, which are two
//! renames within one directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{install_err, InstallError};

const INCOMING_SUFFIX: &str = "gardenia-new";
const OUTGOING_SUFFIX: &str = "gardenia-old";

/// Replace `dest` with the directory at `staged`.
///
/// On success `dest` holds exactly the staged tree and `staged` no longer
/// exists.
pub fn install(staged: &Path, dest: &Path) -> Result<(), InstallError> {
    let (Some(parent), Some(name)) = (dest.parent(), dest.file_name()) else {
        return Err(install_err(
            dest,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"),
        ));
    };
    fs::create_dir_all(parent).map_err(|e| install_err(parent, e))?;

    let name = name.to_string_lossy();
    let incoming = sibling(parent, &name, INCOMING_SUFFIX);
    let outgoing = sibling(parent, &name, OUTGOING_SUFFIX);

    // Leftovers from an interrupted earlier install.
    remove_path(&incoming).map_err(|e| install_err(&incoming, e))?;
    remove_path(&outgoing).map_err(|e| install_err(&outgoing, e))?;

    move_dir(staged, &incoming)?;

    let replacing = fs::symlink_metadata(dest).is_ok();
    if replacing {
        if let Err(e) = fs::rename(dest, &outgoing) {
            let _ = remove_path(&incoming);
            return Err(install_err(dest, e));
        }
    }

    if let Err(e) = fs::rename(&incoming, dest) {
        if replacing {
            let _ = fs::rename(&outgoing, dest);
        }
        let _ = remove_path(&incoming);
        return Err(install_err(dest, e));
    }

    if replacing {
        if let Err(e) = remove_path(&outgoing) {
            tracing::warn!("could not remove previous install {}: {e}", outgoing.display());
        }
    }
    Ok(())
}

fn sibling(parent: &Path, name: &str, suffix: &str) -> PathBuf {
    parent.join(format!(".{name}.{suffix}"))
}

/// Rename `from` to `to`, falling back to a recursive copy when the rename
/// crosses filesystems.
fn move_dir(from: &Path, to: &Path) -> Result<(), InstallError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if let Err(e) = copy_dir_all(from, to) {
        let _ = remove_path(to);
        return Err(e);
    }
    fs::remove_dir_all(from).map_err(|e| install_err(from, e))
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(to).map_err(|e| install_err(to, e))?;
    for entry in fs::read_dir(from).map_err(|e| install_err(from, e))? {
        let entry = entry.map_err(|e| install_err(from, e))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| install_err(&src, e))?;
        if file_type.is_dir() {
            copy_dir_all(&src, &dst)?;
        } else {
            fs::copy(&src, &dst).map_err(|e| install_err(&dst, e))?;
        }
    }
    Ok(())
}

/// Remove a file or directory tree. Missing paths are not an error.
pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
