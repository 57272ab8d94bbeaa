//! Configuration loading.
//!
//! # Precedence
//!
//! ```text
//! environment (DEVLAUNCHER_*)  >  devlauncher.yaml  >  built-in defaults
//! ```
//!
//! # API pattern
//!
//! - [`load_at`] takes home, current directory, and overrides explicitly;
//!   used in tests with `TempDir`.
//! - [`load`] derives them from the process and delegates to [`load_at`].
//!
//! Tests must NEVER call [`load`]; always use [`load_at`].

use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::paths::{default_working_directory, resolve_against, DEFAULT_CONFIGURATION_FILE};
use crate::types::{ConfigFile, LauncherConfig, ShutdownEndpoint, DEFAULT_PORT, DEFAULT_SHUTDOWN_PORT};

pub const ENV_WORKING_DIRECTORY: &str = "DEVLAUNCHER_WORKING_DIRECTORY";
pub const ENV_DEFAULT_PORT: &str = "DEVLAUNCHER_DEFAULT_PORT";
pub const ENV_SHUTDOWN_PORT: &str = "DEVLAUNCHER_SHUTDOWN_PORT";
pub const ENV_PROJECT_DIRECTORY: &str = "DEVLAUNCHER_PROJECT_DIRECTORY";
pub const ENV_CONFIGURATION_FILE: &str = "DEVLAUNCHER_CONFIGURATION_FILE";

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Raw override values as found in the environment.
///
/// A present-but-empty port value disables that port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub working_directory: Option<String>,
    pub default_port: Option<String>,
    pub shutdown_port: Option<String>,
    pub project_directory: Option<String>,
    pub configuration_file: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::default();
        for (key, value) in vars {
            let slot = match key.as_ref() {
                ENV_WORKING_DIRECTORY => &mut overrides.working_directory,
                ENV_DEFAULT_PORT => &mut overrides.default_port,
                ENV_SHUTDOWN_PORT => &mut overrides.shutdown_port,
                ENV_PROJECT_DIRECTORY => &mut overrides.project_directory,
                ENV_CONFIGURATION_FILE => &mut overrides.configuration_file,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        overrides
    }
}

/// Interpret a port override. `Ok(None)` means "disabled".
pub fn parse_port(key: &str, value: &str) -> Result<Option<u16>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u16>()
        .map(|port| Some(port).filter(|port| *port > 0))
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

pub fn resolve_project_directory(cwd: &Path, overrides: &Overrides) -> PathBuf {
    match non_empty(&overrides.project_directory) {
        Some(dir) => resolve_against(cwd, Path::new(dir)),
        None => cwd.to_path_buf(),
    }
}

/// Explicit path first, then the override, then `<project>/devlauncher.yaml`.
pub fn resolve_configuration_file(
    project_dir: &Path,
    overrides: &Overrides,
    explicit: Option<&Path>,
) -> PathBuf {
    if let Some(explicit) = explicit {
        return resolve_against(project_dir, explicit);
    }
    let name = non_empty(&overrides.configuration_file).unwrap_or(DEFAULT_CONFIGURATION_FILE);
    resolve_against(project_dir, Path::new(name))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse a configuration file. Returns `Ok(None)` if it does not exist.
pub fn load_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    if contents.trim().is_empty() {
        return Ok(Some(ConfigFile::default()));
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Resolve the complete launcher configuration.
///
/// `home` may be `None` only when the working directory is configured
/// explicitly. An explicitly named configuration file must exist; the
/// default one is optional. The working directory is created if absent.
pub fn load_at(
    home: Option<&Path>,
    cwd: &Path,
    explicit_file: Option<&Path>,
    overrides: &Overrides,
) -> Result<LauncherConfig, ConfigError> {
    let project_dir = resolve_project_directory(cwd, overrides);
    let config_path = resolve_configuration_file(&project_dir, overrides, explicit_file);

    let loaded = load_file(&config_path)?;
    if loaded.is_none() && explicit_file.is_some() {
        return Err(io_err(
            &config_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found"),
        ));
    }
    let configuration_file = loaded.as_ref().map(|_| config_path.clone());
    let file = loaded.unwrap_or_default();

    let working_directory = match non_empty(&overrides.working_directory) {
        Some(dir) => resolve_against(cwd, Path::new(dir)),
        None => match &file.working_directory {
            Some(dir) => resolve_against(&project_dir, dir),
            None => default_working_directory(home.ok_or(ConfigError::HomeNotFound)?),
        },
    };
    if !working_directory.exists() {
        std::fs::create_dir_all(&working_directory).map_err(|e| io_err(&working_directory, e))?;
    }

    let default_port = match &overrides.default_port {
        Some(value) => parse_port(ENV_DEFAULT_PORT, value)?,
        None => Some(file.default_port.unwrap_or(DEFAULT_PORT)).filter(|port| *port > 0),
    };
    let shutdown_port = match &overrides.shutdown_port {
        Some(value) => parse_port(ENV_SHUTDOWN_PORT, value)?,
        None => Some(file.shutdown_port.unwrap_or(DEFAULT_SHUTDOWN_PORT)),
    };

    Ok(LauncherConfig {
        project_directory: project_dir,
        configuration_file,
        working_directory,
        default_port,
        shutdown: ShutdownEndpoint::new(shutdown_port),
        server: file.server,
        connectors: file.connectors,
        webapps: file.webapps,
        generated_webapps: file.generated_webapps,
        copy_resources: file.copy_resources,
    })
}

/// `load_at` convenience wrapper reading home, cwd, and `DEVLAUNCHER_*` from
/// the process. A `project_dir` given here wins over the environment.
pub fn load(
    explicit_file: Option<&Path>,
    project_dir: Option<&Path>,
) -> Result<LauncherConfig, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| io_err(".", e))?;
    let home = dirs::home_dir();
    let mut overrides = Overrides::from_env();
    if let Some(dir) = project_dir {
        overrides.project_directory = Some(dir.display().to_string());
    }
    load_at(home.as_deref(), &cwd, explicit_file, &overrides)
}
