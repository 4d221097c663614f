//! Zip snapshot extraction.
//!
//! Hosting services wrap a snapshot in one top-level directory named
//! `<repo>-<marker>`. [`unpack`] recreates the archive tree under an output
//! directory; [`locate_snapshot`] finds that top-level directory afterwards.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use gardenia_core::CommitMarker;

use crate::error::UnpackError;

/// Extract every entry of the zip at `archive` into `out_dir`.
///
/// Entry names that are absolute or contain `..` are rejected before
/// anything is written for them. Unix permission bits stored in the archive
/// are applied to extracted files and directories.
pub fn unpack(archive: &Path, out_dir: &Path) -> Result<(), UnpackError> {
    let file = File::open(archive).map_err(|source| UnpackError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let malformed = |source| UnpackError::Malformed {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = zip::ZipArchive::new(file).map_err(malformed)?;

    fs::create_dir_all(out_dir).map_err(|e| write_err(out_dir, e))?;

    let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(malformed)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(UnpackError::UnsafePath {
                entry: entry.name().to_string(),
            });
        };
        let target = out_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| write_err(&target, e))?;
            if let Some(mode) = entry.unix_mode() {
                dir_modes.push((target, mode));
            }
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| write_err(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| write_err(&target, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| write_err(&target, e))?;
            }
        }
    }

    // Deepest first, after all children exist. The owner keeps rwx so the
    // tree can still be moved and removed.
    dir_modes.sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));
    for (dir, mode) in dir_modes {
        set_dir_mode(&dir, mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path, mode: u32) -> Result<(), UnpackError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode((mode & 0o7777) | 0o700))
        .map_err(|e| write_err(dir, e))
}

#[cfg(not(unix))]
fn set_dir_mode(_dir: &Path, _mode: u32) -> Result<(), UnpackError> {
    Ok(())
}

fn write_err(path: &Path, source: io::Error) -> UnpackError {
    UnpackError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Find the snapshot directory inside `out_dir`.
///
/// Prefers `<repo>-<marker>`; otherwise accepts the only top-level directory.
pub fn locate_snapshot(
    out_dir: &Path,
    repo: &str,
    marker: &CommitMarker,
) -> Result<PathBuf, UnpackError> {
    let expected = out_dir.join(format!("{repo}-{marker}"));
    if expected.is_dir() {
        return Ok(expected);
    }

    let dirs: Vec<PathBuf> = fs::read_dir(out_dir)
        .map_err(|e| write_err(out_dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(UnpackError::SnapshotNotFound {
            path: out_dir.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn build_zip(path: &Path, entries: &[(&str, Option<&str>, u32)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, contents, mode) in entries {
            let options = FileOptions::default().unix_permissions(*mode);
            match contents {
                Some(body) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(body.as_bytes()).unwrap();
                }
                None => zip.add_directory(*name, options).unwrap(),
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn unpacks_nested_tree() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(
            &archive,
            &[
                ("repo-abc/", None, 0o755),
                ("repo-abc/plugin/", None, 0o755),
                ("repo-abc/plugin/x.vim", Some("let g:x = 1\n"), 0o644),
                ("repo-abc/README.md", Some("# hi\n"), 0o644),
            ],
        );
        let out = tmp.path().join("out");
        unpack(&archive, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("repo-abc/plugin/x.vim")).unwrap(),
            "let g:x = 1\n"
        );
        assert!(out.join("repo-abc/README.md").is_file());
    }

    #[test]
    fn creates_missing_parents_for_files_without_dir_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(&archive, &[("r-1/deep/er/file.txt", Some("x"), 0o644)]);
        let out = tmp.path().join("out");
        unpack(&archive, &out).unwrap();
        assert!(out.join("r-1/deep/er/file.txt").is_file());
    }

    #[test]
    #[cfg(unix)]
    fn preserves_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(&archive, &[("r-1/bin/tool", Some("#!/bin/sh\n"), 0o755)]);
        let out = tmp.path().join("out");
        unpack(&archive, &out).unwrap();
        let mode = fs::metadata(out.join("r-1/bin/tool")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    #[cfg(unix)]
    fn applies_directory_modes_after_children() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        build_zip(
            &archive,
            &[
                ("r-1/", None, 0o750),
                ("r-1/ro/", None, 0o555),
                ("r-1/ro/file.vim", Some("x"), 0o644),
            ],
        );
        let out = tmp.path().join("out");
        unpack(&archive, &out).unwrap();

        let mode_of = |p: &str| fs::metadata(out.join(p)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode_of("r-1"), 0o750);
        assert_eq!(mode_of("r-1/ro"), 0o755, "owner keeps rwx");
        assert!(out.join("r-1/ro/file.vim").is_file());
    }

    #[test]
    fn rejects_parent_traversal() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.zip");
        build_zip(&archive, &[("../evil.txt", Some("pwned"), 0o644)]);
        let out = tmp.path().join("out");
        let err = unpack(&archive, &out).unwrap_err();
        assert!(matches!(err, UnpackError::UnsafePath { .. }), "got: {err}");
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn malformed_archive_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bad.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();
        let err = unpack(&archive, &tmp.path().join("out")).unwrap_err();
        assert!(matches!(err, UnpackError::Malformed { .. }), "got: {err}");
    }

    #[test]
    fn missing_archive_is_an_open_error() {
        let tmp = TempDir::new().unwrap();
        let err = unpack(&tmp.path().join("nope.zip"), &tmp.path().join("out")).unwrap_err();
        assert!(matches!(err, UnpackError::Open { .. }));
    }

    #[test]
    fn locate_prefers_conventional_name() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("vim-x-abc")).unwrap();
        fs::create_dir_all(tmp.path().join("other")).unwrap();
        let found = locate_snapshot(tmp.path(), "vim-x", &CommitMarker::from("abc")).unwrap();
        assert_eq!(found, tmp.path().join("vim-x-abc"));
    }

    #[test]
    fn locate_falls_back_to_single_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("renamed-snapshot")).unwrap();
        let found = locate_snapshot(tmp.path(), "vim-x", &CommitMarker::from("abc")).unwrap();
        assert_eq!(found, tmp.path().join("renamed-snapshot"));
    }

    #[test]
    fn locate_fails_when_ambiguous() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        let err = locate_snapshot(tmp.path(), "vim-x", &CommitMarker::from("abc")).unwrap_err();
        assert!(matches!(err, UnpackError::SnapshotNotFound { .. }));
    }
}
