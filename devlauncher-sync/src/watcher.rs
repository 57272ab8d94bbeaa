//! Notification dispatch: turns filesystem events under a watched source
//! tree into copy and delete operations on the mirrored target.
//!
//! Watches are registered per directory (non-recursive), one registration
//! per source directory. A registration is keyed by the watched path, which
//! is the same handle the notification backend uses, so every event's
//! parent directory maps back to exactly one `(source, target)` pair.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};

use crate::error::{io_err, SyncError};
use crate::filter::FileFilter;
use crate::mirror::{mirror_file, MirrorOutcome};
use crate::tree::{remove_path, sync_directory};

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One path-level change inside a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Created, path: path.into() }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Modified, path: path.into() }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self { kind: ChangeKind::Deleted, path: path.into() }
    }
}

/// Flatten a backend event into path-level changes. Renames become a
/// delete of the old name plus a create of the new one.
pub fn changes_from_event(event: &Event) -> Vec<Change> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            return event
                .paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    if i == 0 {
                        Change::deleted(path.clone())
                    } else {
                        Change::created(path.clone())
                    }
                })
                .collect();
        }
        // Backends that cannot tell the two halves of a rename apart.
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .map(|path| {
                    if path.exists() {
                        Change::created(path.clone())
                    } else {
                        Change::deleted(path.clone())
                    }
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Modified,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| Change { kind, path: path.clone() })
        .collect()
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// The part of a notification service the dispatcher drives.
pub trait WatchBackend: Send {
    fn watch(&mut self, directory: &Path) -> Result<(), SyncError>;
    fn unwatch(&mut self, directory: &Path) -> Result<(), SyncError>;
}

/// A watched source directory and where its entries are mirrored to.
#[derive(Debug, Clone)]
pub struct WatchRegistration {
    pub source: PathBuf,
    pub target: PathBuf,
    pub filter: FileFilter,
}

/// What [`DirectoryWatcher::handle`] did with a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Copied,
    Unchanged,
    DirectorySynced { copied: usize, watched: usize },
    Removed,
    /// Nothing to do: filtered out, not a regular file, or already gone.
    Ignored,
    /// The parent directory has no registration.
    Unmapped,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct DirectoryWatcher<B> {
    backend: B,
    registrations: HashMap<PathBuf, WatchRegistration>,
}

impl<B: WatchBackend> DirectoryWatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registrations: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registration(&self, source: &Path) -> Option<&WatchRegistration> {
        self.registrations.get(source)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Watch `source` and every directory below it, mapping each to the
    /// matching directory under `target`. Directories the backend refuses
    /// are logged and skipped. Returns the number of new registrations.
    pub fn register_tree(&mut self, source: &Path, target: &Path, filter: &FileFilter) -> usize {
        let mut dirs = vec![(source.to_path_buf(), target.to_path_buf())];
        let mut cursor = 0;
        let mut registered = 0;

        while cursor < dirs.len() {
            let (src, tgt) = dirs[cursor].clone();
            cursor += 1;

            if !self.registrations.contains_key(&src) {
                if let Err(err) = self.backend.watch(&src) {
                    tracing::debug!(path = %src.display(), error = %err, "cannot watch directory");
                    continue;
                }
                tracing::debug!(path = %src.display(), "watching source directory");
                self.registrations.insert(
                    src.clone(),
                    WatchRegistration {
                        source: src.clone(),
                        target: tgt.clone(),
                        filter: filter.clone(),
                    },
                );
                registered += 1;
            }

            let entries = match fs::read_dir(&src) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!(path = %src.display(), error = %err, "cannot list directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                // Symlinked directories are copied but not followed for watches.
                if entry.file_type().map(|ty| ty.is_dir()).unwrap_or(false) {
                    dirs.push((entry.path(), tgt.join(entry.file_name())));
                }
            }
        }

        registered
    }

    /// Apply one change to the mirror.
    pub fn handle(&mut self, change: &Change) -> Result<ChangeOutcome, SyncError> {
        if change.kind == ChangeKind::Deleted {
            self.forget(&change.path);
        }

        let (target, filter) = match self.lookup(&change.path) {
            Some(found) => found,
            None => {
                tracing::trace!(path = %change.path.display(), "no registration for change");
                return Ok(ChangeOutcome::Unmapped);
            }
        };

        match change.kind {
            ChangeKind::Created => self.handle_created(&change.path, &target, &filter),
            ChangeKind::Modified => handle_modified(&change.path, &target, &filter),
            ChangeKind::Deleted => handle_deleted(&change.path, &target, &filter),
        }
    }

    /// Dispatch events until the backend's sender side is dropped.
    pub fn run(mut self, events: Receiver<notify::Result<Event>>) {
        for event in events.iter() {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watcher event error");
                    continue;
                }
            };
            for change in changes_from_event(&event) {
                match self.handle(&change) {
                    Ok(outcome) => tracing::trace!(
                        path = %change.path.display(),
                        kind = ?change.kind,
                        outcome = ?outcome,
                        "change applied",
                    ),
                    Err(err) => tracing::warn!(
                        path = %change.path.display(),
                        error = %err,
                        "cannot mirror change",
                    ),
                }
            }
        }
        tracing::trace!("file watching service closed");
    }

    fn lookup(&self, path: &Path) -> Option<(PathBuf, FileFilter)> {
        let parent = path.parent()?;
        let name = path.file_name()?;
        self.registrations
            .get(parent)
            .map(|registration| (registration.target.join(name), registration.filter.clone()))
    }

    fn handle_created(
        &mut self,
        source: &Path,
        target: &Path,
        filter: &FileFilter,
    ) -> Result<ChangeOutcome, SyncError> {
        let meta = match fs::metadata(source) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ChangeOutcome::Ignored),
            Err(err) => return Err(io_err(source, err)),
        };
        if !meta.is_dir() {
            return handle_modified(source, target, filter);
        }

        // Watch before copying so files landing mid-copy still raise events.
        let watched = self.register_tree(source, target, filter);
        let copied = sync_directory(source, target, filter)?;
        Ok(ChangeOutcome::DirectorySynced { copied, watched })
    }

    /// Remove registrations for `path` and anything beneath it.
    fn forget(&mut self, path: &Path) {
        let stale: Vec<PathBuf> = self
            .registrations
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect();
        for key in stale {
            self.registrations.remove(&key);
            // The backend usually dropped the watch with the directory.
            if let Err(err) = self.backend.unwatch(&key) {
                tracing::trace!(path = %key.display(), error = %err, "unwatch failed");
            }
            tracing::debug!(path = %key.display(), "stopped watching removed directory");
        }
    }
}

fn handle_modified(
    source: &Path,
    target: &Path,
    filter: &FileFilter,
) -> Result<ChangeOutcome, SyncError> {
    let meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ChangeOutcome::Ignored),
        Err(err) => return Err(io_err(source, err)),
    };
    if !meta.is_file() || !filter.accepts(source) {
        return Ok(ChangeOutcome::Ignored);
    }

    Ok(match mirror_file(source, target)? {
        MirrorOutcome::Copied => ChangeOutcome::Copied,
        MirrorOutcome::Unchanged => ChangeOutcome::Unchanged,
        MirrorOutcome::Vanished => ChangeOutcome::Ignored,
    })
}

fn handle_deleted(
    source: &Path,
    target: &Path,
    filter: &FileFilter,
) -> Result<ChangeOutcome, SyncError> {
    // A filtered-out file never reached the target; leave any namesake alone.
    if !target.is_dir() && !filter.accepts(source) {
        return Ok(ChangeOutcome::Ignored);
    }
    Ok(if remove_path(target)? {
        ChangeOutcome::Removed
    } else {
        ChangeOutcome::Ignored
    })
}
