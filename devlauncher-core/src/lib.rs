//! Devlauncher core library: configuration model, loading, errors.
//!
//! Public API surface:
//! - [`types`]: launcher configuration and the shutdown endpoint
//! - [`config`]: file + environment loading
//! - [`paths`]: working-directory layout
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{load, load_at, Overrides};
pub use error::ConfigError;
pub use types::{
    ConfigFile, ConnectorConfig, CopyDefinition, CopyResourcesConfig, GeneratedWebappConfig,
    LauncherConfig, ServerCommand, ShutdownEndpoint, WebappConfig,
};
