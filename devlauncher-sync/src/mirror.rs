//! Single-file mirror.
//!
//! ## Staleness rule
//!
//! A target needs rewriting when any of these holds:
//!
//! 1. it does not exist;
//! 2. its byte length differs from the source;
//! 3. the source was modified strictly later than the target.
//!
//! Timestamps are compared at full precision, so a same-size rewrite inside
//! one millisecond is still picked up. Copies carry the source's access and
//! modification times over exactly, which is what makes a second pass over
//! an unchanged tree write nothing.

use std::fs::{self, Metadata};
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use filetime::FileTime;

use crate::error::{io_err, SyncError};

/// Whether a mirrored file has to be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDecision {
    Update,
    Skip,
}

/// The metadata the staleness rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: SystemTime,
}

impl FileStamp {
    pub fn new(len: u64, modified: SystemTime) -> Self {
        Self { len, modified }
    }

    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
        }
    }

    /// `Ok(None)` when nothing exists at `path`.
    pub fn read(path: &Path) -> Result<Option<Self>, SyncError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }
}

/// Apply the staleness rule. Pure; touches no filesystem state.
pub fn decide(source: &FileStamp, target: Option<&FileStamp>) -> CopyDecision {
    match target {
        None => CopyDecision::Update,
        Some(target) if target.len != source.len => CopyDecision::Update,
        Some(target) if source.modified > target.modified => CopyDecision::Update,
        Some(_) => CopyDecision::Skip,
    }
}

/// Outcome of mirroring one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Target was (re)written.
    Copied,
    /// Target already matched the source.
    Unchanged,
    /// Source disappeared before it could be copied.
    Vanished,
}

/// Copy `source` over `target` if the staleness rule says so.
pub fn mirror_file(source: &Path, target: &Path) -> Result<MirrorOutcome, SyncError> {
    copy_file(source, target, false)
}

/// Shared by the live mirror and one-shot copies; `force` skips the rule.
pub(crate) fn copy_file(
    source: &Path,
    target: &Path,
    force: bool,
) -> Result<MirrorOutcome, SyncError> {
    let source_meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %source.display(), "source vanished before copy");
            return Ok(MirrorOutcome::Vanished);
        }
        Err(err) => return Err(io_err(source, err)),
    };

    if !force {
        let target_stamp = FileStamp::read(target)?;
        let decision = decide(&FileStamp::from_metadata(&source_meta), target_stamp.as_ref());
        if decision == CopyDecision::Skip {
            tracing::trace!(path = %target.display(), "unchanged");
            return Ok(MirrorOutcome::Unchanged);
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    if let Err(err) = fs::copy(source, target) {
        if err.kind() == ErrorKind::NotFound && !source.exists() {
            tracing::debug!(path = %source.display(), "source vanished during copy");
            return Ok(MirrorOutcome::Vanished);
        }
        return Err(io_err(target, err));
    }

    let atime = FileTime::from_last_access_time(&source_meta);
    let mtime = FileTime::from_last_modification_time(&source_meta);
    filetime::set_file_times(target, atime, mtime).map_err(|e| io_err(target, e))?;

    tracing::debug!("copied: {} -> {}", source.display(), target.display());
    Ok(MirrorOutcome::Copied)
}
