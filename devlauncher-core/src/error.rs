//! Error types for devlauncher-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving launcher configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the file path and line context from serde_yaml.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An override carried a value that cannot be interpreted.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    /// A directory the configuration points at does not exist.
    #[error("cannot find {what} at {path}")]
    MissingDirectory { what: String, path: PathBuf },

    /// `dirs::home_dir()` returned `None`, so there is no default working directory.
    #[error("cannot determine home directory; set $HOME or DEVLAUNCHER_WORKING_DIRECTORY")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
