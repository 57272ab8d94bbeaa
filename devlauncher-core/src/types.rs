//! Domain types for launcher configuration.
//!
//! [`ConfigFile`] is the raw document as written in `devlauncher.yaml`;
//! [`LauncherConfig`] is the resolved form the runtime consumes, with
//! overrides applied and relative paths anchored at the project directory.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::{
    generated_webapp_dir, resolve_against, DEFAULT_RESOURCES_DIRECTORY, DEFAULT_WEBAPP_DIRECTORY,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SHUTDOWN_PORT: u16 = 8081;
pub const DEFAULT_URI_ENCODING: &str = "UTF-8";

// ---------------------------------------------------------------------------
// Shutdown endpoint
// ---------------------------------------------------------------------------

/// Loopback control-plane address used by the single-instance handshake.
///
/// A port of `0` (or none at all) disables the mechanism entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ShutdownEndpoint {
    port: Option<u16>,
}

impl ShutdownEndpoint {
    pub fn new(port: Option<u16>) -> Self {
        Self {
            port: port.filter(|port| *port > 0),
        }
    }

    pub fn disabled() -> Self {
        Self { port: None }
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_enabled(&self) -> bool {
        self.port.is_some()
    }

    /// `127.0.0.1:<port>`; never a wildcard address.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.port.map(|port| SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }
}

impl fmt::Display for ShutdownEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "loopback:{port}"),
            None => write!(f, "disabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration sections
// ---------------------------------------------------------------------------

/// External server process started by the command-backed container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// An additional listening connector registered with the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_uri_encoding")]
    pub uri_encoding: String,
}

impl ConnectorConfig {
    pub fn http(port: u16) -> Self {
        Self {
            port,
            protocol: None,
            redirect_port: None,
            secure: false,
            uri_encoding: default_uri_encoding(),
        }
    }
}

impl fmt::Display for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.protocol.as_deref().unwrap_or("http"),
            self.port
        )?;
        if let Some(redirect) = self.redirect_port {
            write!(f, "->{redirect}")?;
        }
        if self.secure {
            write!(f, "+secure")?;
        }
        Ok(())
    }
}

fn default_uri_encoding() -> String {
    DEFAULT_URI_ENCODING.to_string()
}

fn default_true() -> bool {
    true
}

/// An exploded webapp served straight from a project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebappConfig {
    pub context: String,
    /// Explicit webapp directory; wins over every derived location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webapp_directory_name: Option<String>,
    /// Per-webapp context configuration handed to the server, relative to
    /// the project directory. Skipped when the file does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,
}

impl WebappConfig {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            directory: None,
            project_directory: None,
            workspace_directory: None,
            webapp_directory_name: None,
            context_file: None,
        }
    }

    pub fn context_path(&self) -> String {
        context_path(&self.context)
    }

    /// The configured context file, if one is set and exists.
    pub fn resolve_context_file(&self, project_dir: &Path) -> Option<PathBuf> {
        let file = resolve_against(project_dir, self.context_file.as_ref()?);
        file.is_file().then_some(file)
    }

    /// Locate the webapp directory.
    ///
    /// Lookup order: `directory`, then
    /// `<project_directory>/<webapp_directory_name>`, where the project
    /// directory defaults to `<workspace>/<context>` and the workspace to the
    /// parent of `project_dir`. Every step must exist on disk.
    pub fn resolve_directory(&self, project_dir: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(directory) = &self.directory {
            return existing_dir("webapp directory", resolve_against(project_dir, directory));
        }

        let project = match &self.project_directory {
            Some(project) => {
                existing_dir("project directory", resolve_against(project_dir, project))?
            }
            None => {
                let workspace = match &self.workspace_directory {
                    Some(workspace) => existing_dir(
                        "workspace directory",
                        resolve_against(project_dir, workspace),
                    )?,
                    None => project_dir
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| project_dir.to_path_buf()),
                };
                let name = self.context.trim_matches('/');
                existing_dir("project directory", workspace.join(name))?
            }
        };

        let name = self
            .webapp_directory_name
            .as_deref()
            .unwrap_or(DEFAULT_WEBAPP_DIRECTORY);
        existing_dir("webapp directory", project.join(name))
    }
}

/// One source tree mirrored into a generated webapp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyDefinition {
    pub source: PathBuf,
    /// Subdirectory below the webapp root that receives the files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subdirectory: Option<String>,
    /// File extensions to mirror; empty mirrors everything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

/// A webapp assembled in the working directory from several source trees
/// and kept live while the container runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedWebappConfig {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_directory: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<CopyDefinition>,
}

impl GeneratedWebappConfig {
    pub fn context_path(&self) -> String {
        context_path(&self.context)
    }

    pub fn resolve_target(&self, project_dir: &Path, working_dir: &Path) -> PathBuf {
        match &self.target_directory {
            Some(target) => resolve_against(project_dir, target),
            None => generated_webapp_dir(working_dir, &self.context),
        }
    }

    /// `(source, target)` per copy definition, both absolute.
    pub fn resolve_pairs(&self, project_dir: &Path, working_dir: &Path) -> Vec<(PathBuf, PathBuf)> {
        let root = self.resolve_target(project_dir, working_dir);
        self.sources
            .iter()
            .map(|definition| {
                let target = match &definition.target_subdirectory {
                    Some(sub) => root.join(sub),
                    None => root.clone(),
                };
                (resolve_against(project_dir, &definition.source), target)
            })
            .collect()
    }
}

/// One-shot copy performed before the container starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyResourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Only rewrite files the staleness rule marks as outdated.
    #[serde(default = "default_true")]
    pub updated_only: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

impl CopyResourcesConfig {
    /// Defaults to `<project>/src/main/resources` when no source is set.
    pub fn resolve_source(&self, project_dir: &Path) -> PathBuf {
        match &self.source {
            Some(source) => resolve_against(project_dir, source),
            None => project_dir.join(DEFAULT_RESOURCES_DIRECTORY),
        }
    }

    pub fn resolve_target(&self, project_dir: &Path) -> PathBuf {
        resolve_against(project_dir, &self.target)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Raw `devlauncher.yaml` contents. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub working_directory: Option<PathBuf>,
    pub default_port: Option<u16>,
    pub shutdown_port: Option<u16>,
    pub server: Option<ServerCommand>,
    pub connectors: Vec<ConnectorConfig>,
    pub webapps: Vec<WebappConfig>,
    pub generated_webapps: Vec<GeneratedWebappConfig>,
    pub copy_resources: Vec<CopyResourcesConfig>,
}

/// Fully resolved launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LauncherConfig {
    pub project_directory: PathBuf,
    /// The file the values were read from, if one existed.
    pub configuration_file: Option<PathBuf>,
    pub working_directory: PathBuf,
    pub default_port: Option<u16>,
    pub shutdown: ShutdownEndpoint,
    pub server: Option<ServerCommand>,
    pub connectors: Vec<ConnectorConfig>,
    pub webapps: Vec<WebappConfig>,
    pub generated_webapps: Vec<GeneratedWebappConfig>,
    pub copy_resources: Vec<CopyResourcesConfig>,
}

impl LauncherConfig {
    /// Defaults only: port 8080, shutdown port 8081, nothing registered.
    pub fn new(project_directory: impl Into<PathBuf>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_directory: project_directory.into(),
            configuration_file: None,
            working_directory: working_directory.into(),
            default_port: Some(DEFAULT_PORT),
            shutdown: ShutdownEndpoint::new(Some(DEFAULT_SHUTDOWN_PORT)),
            server: None,
            connectors: Vec::new(),
            webapps: Vec::new(),
            generated_webapps: Vec::new(),
            copy_resources: Vec::new(),
        }
    }
}

/// `""` for the root context, `/<name>` otherwise.
pub fn context_path(name: &str) -> String {
    let trimmed = name.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn existing_dir(what: &str, path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfigError::MissingDirectory {
            what: what.to_string(),
            path,
        })
    }
}
