use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the launch lifecycle and its collaborators.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] devlauncher_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] devlauncher_sync::SyncError),

    #[error("cannot bind shutdown listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("container error: {0}")]
    Container(String),

    #[error("customizer '{name}' failed: {source}")]
    Customizer {
        name: String,
        #[source]
        source: Box<LaunchError>,
    },

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LaunchError {
    LaunchError::Io {
        path: path.into(),
        source,
    }
}
