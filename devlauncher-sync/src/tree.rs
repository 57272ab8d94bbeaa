//! Directory-level copy and removal.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};
use crate::filter::FileFilter;
use crate::mirror::{copy_file, MirrorOutcome};

/// Knobs for a directory pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Applied to regular files only; directories are always traversed.
    pub filter: FileFilter,
    pub recursive: bool,
    /// When false every accepted file is rewritten.
    pub updated_only: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            filter: FileFilter::accept_all(),
            recursive: true,
            updated_only: true,
        }
    }
}

impl SyncOptions {
    pub fn filtered(filter: FileFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Mirror every accepted file under `source` into `target`, creating target
/// directories as needed. Returns the number of files written.
pub fn sync_directory(
    source: &Path,
    target: &Path,
    filter: &FileFilter,
) -> Result<usize, SyncError> {
    sync_directory_with(source, target, &SyncOptions::filtered(filter.clone()))
}

pub fn sync_directory_with(
    source: &Path,
    target: &Path,
    options: &SyncOptions,
) -> Result<usize, SyncError> {
    if !target.is_dir() {
        fs::create_dir_all(target).map_err(|e| io_err(target, e))?;
    }

    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %source.display(), "source directory vanished");
            return Ok(0);
        }
        Err(err) => return Err(io_err(source, err)),
    };

    let mut children: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    children.sort();

    let mut copied = 0;
    for child in children {
        let Some(name) = child.file_name() else {
            continue;
        };
        let target_child = target.join(name);

        let meta = match fs::metadata(&child) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&child, err)),
        };

        if meta.is_dir() {
            if options.recursive {
                copied += sync_directory_with(&child, &target_child, options)?;
            }
        } else if meta.is_file() && options.filter.accepts(&child) {
            let outcome = copy_file(&child, &target_child, !options.updated_only)?;
            if outcome == MirrorOutcome::Copied {
                copied += 1;
            }
        }
    }

    Ok(copied)
}

/// Remove a file or a whole directory tree. Returns `false` when there was
/// nothing to remove.
pub fn remove_path(path: &Path) -> Result<bool, SyncError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(path, err)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed");
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}
