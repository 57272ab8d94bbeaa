//! Error types for devlauncher-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from mirroring and watching.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem notification backend refused a request.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// A session was asked to mirror a directory that does not exist.
    #[error("source directory not found: {path}")]
    MissingSource { path: PathBuf },

    /// A session source exists but is not a directory.
    #[error("source is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
