//! A live mirror: one initial pass, then notification-driven updates on a
//! dedicated thread until [`SyncSession::close`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{io_err, SyncError};
use crate::filter::FileFilter;
use crate::tree::sync_directory;
use crate::watcher::{DirectoryWatcher, WatchBackend};

/// A source tree and the directory it is mirrored into.
#[derive(Debug, Clone)]
pub struct SyncPair {
    pub source: PathBuf,
    pub target: PathBuf,
    pub filter: FileFilter,
}

impl SyncPair {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            filter: FileFilter::accept_all(),
        }
    }

    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Handle to the OS watcher shared between the session and its dispatch
/// thread. Taking the watcher out drops the event sender, which ends the
/// dispatch loop.
#[derive(Clone)]
struct SharedWatcher(Arc<Mutex<Option<RecommendedWatcher>>>);

impl SharedWatcher {
    fn new(watcher: RecommendedWatcher) -> Self {
        Self(Arc::new(Mutex::new(Some(watcher))))
    }

    /// Returns `true` if this call did the closing.
    fn close(&self) -> bool {
        let taken = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        taken.is_some()
    }

    fn is_closed(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl WatchBackend for SharedWatcher {
    fn watch(&mut self, directory: &Path) -> Result<(), SyncError> {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(watcher) => Ok(watcher.watch(directory, RecursiveMode::NonRecursive)?),
            None => Ok(()),
        }
    }

    fn unwatch(&mut self, directory: &Path) -> Result<(), SyncError> {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(watcher) => Ok(watcher.unwatch(directory)?),
            None => Ok(()),
        }
    }
}

pub struct SyncSession {
    pairs: Vec<SyncPair>,
    initial_copies: usize,
    watcher: SharedWatcher,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncSession {
    /// Mirror `source` into `target`. With no filter every file is copied.
    pub fn create(
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        filter: Option<FileFilter>,
    ) -> Result<Self, SyncError> {
        let pair = SyncPair::new(source.as_ref(), target.as_ref())
            .with_filter(filter.unwrap_or_default());
        Self::create_all(vec![pair])
    }

    /// Mirror several pairs under one watcher and one dispatch thread.
    pub fn create_all(pairs: Vec<SyncPair>) -> Result<Self, SyncError> {
        let mut resolved = Vec::with_capacity(pairs.len());
        for pair in pairs {
            resolved.push(prepare(pair)?);
        }

        let mut initial_copies = 0;
        for pair in &resolved {
            let copied = sync_directory(&pair.source, &pair.target, &pair.filter)?;
            tracing::debug!(
                source = %pair.source.display(),
                target = %pair.target.display(),
                copied,
                "initial sync complete",
            );
            initial_copies += copied;
        }

        let (event_tx, event_rx): (_, Receiver<notify::Result<Event>>) = mpsc::channel();
        let watcher = SharedWatcher::new(notify::recommended_watcher(event_tx)?);
        let mut dispatcher = DirectoryWatcher::new(watcher.clone());
        for pair in &resolved {
            dispatcher.register_tree(&pair.source, &pair.target, &pair.filter);
        }

        let name = match resolved.first() {
            Some(pair) => format!("sync:{}", pair.source.display()),
            None => "sync".to_string(),
        };
        let worker = thread::Builder::new()
            .name(name)
            .spawn(move || dispatcher.run(event_rx))
            .map_err(|e| io_err("<sync thread>", e))?;

        Ok(Self {
            pairs: resolved,
            initial_copies,
            watcher,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Pairs with canonical source paths.
    pub fn pairs(&self) -> &[SyncPair] {
        &self.pairs
    }

    /// Files written by the initial pass.
    pub fn initial_copies(&self) -> usize {
        self.initial_copies
    }

    pub fn is_closed(&self) -> bool {
        self.watcher.is_closed()
    }

    /// Stop watching and wait for the dispatch thread. Safe to call more
    /// than once and from any thread.
    pub fn close(&self) {
        if self.watcher.close() {
            tracing::debug!(pairs = self.pairs.len(), "closing sync session");
        }
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                tracing::warn!("sync dispatch thread panicked");
            }
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn prepare(pair: SyncPair) -> Result<SyncPair, SyncError> {
    let meta = match fs::metadata(&pair.source) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SyncError::MissingSource { path: pair.source });
        }
        Err(err) => return Err(io_err(&pair.source, err)),
    };
    if !meta.is_dir() {
        return Err(SyncError::NotADirectory { path: pair.source });
    }

    // Notification paths arrive canonical (e.g. /private/var on macOS).
    let source = fs::canonicalize(&pair.source).map_err(|e| io_err(&pair.source, e))?;

    if !pair.target.is_dir() {
        fs::create_dir_all(&pair.target).map_err(|e| io_err(&pair.target, e))?;
    }

    Ok(SyncPair { source, ..pair })
}
