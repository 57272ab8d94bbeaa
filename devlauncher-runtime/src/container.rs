//! The container collaborator: something that can be started, stopped and
//! awaited, and that accepts connector and webapp registrations first.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use devlauncher_core::paths::server_dir;
use devlauncher_core::{ConnectorConfig, LauncherConfig, ServerCommand};

use crate::error::{io_err, LaunchError};

pub const ENV_PORT: &str = "DEVLAUNCHER_PORT";
pub const ENV_CONNECTORS: &str = "DEVLAUNCHER_CONNECTORS";
pub const ENV_WEBAPPS: &str = "DEVLAUNCHER_WEBAPPS";
pub const ENV_CONTEXT_FILES: &str = "DEVLAUNCHER_CONTEXT_FILES";
pub const ENV_WORKING_DIRECTORY: &str = "DEVLAUNCHER_WORKING_DIRECTORY";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub trait Container: Send + Sync {
    fn add_connector(&mut self, connector: ConnectorConfig);

    /// `context_path` is `""` for the root context. `context_file` is the
    /// webapp's own context configuration, when it has one.
    fn add_webapp(&mut self, context_path: &str, directory: &Path, context_file: Option<&Path>);

    fn start(&self) -> Result<(), LaunchError>;

    /// Idempotent.
    fn stop(&self) -> Result<(), LaunchError>;

    /// Block until the container stopped, by [`Container::stop`] or on its own.
    fn await_termination(&self) -> Result<(), LaunchError>;
}

/// Registrations collected before start.
#[derive(Debug, Clone, Default)]
struct Registrations {
    connectors: Vec<ConnectorConfig>,
    webapps: Vec<WebappRegistration>,
}

#[derive(Debug, Clone)]
struct WebappRegistration {
    context_path: String,
    directory: PathBuf,
    context_file: Option<PathBuf>,
}

impl WebappRegistration {
    fn new(context_path: &str, directory: &Path, context_file: Option<&Path>) -> Self {
        Self {
            context_path: context_path.to_string(),
            directory: directory.to_path_buf(),
            context_file: context_file.map(Path::to_path_buf),
        }
    }

    /// The root context is exported as `/`.
    fn exported_context(&self) -> &str {
        if self.context_path.is_empty() {
            "/"
        } else {
            &self.context_path
        }
    }
}

impl Registrations {
    fn connectors_value(&self) -> String {
        self.connectors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `context=directory` entries separated by `;`; the root context is `/`.
    fn webapps_value(&self) -> String {
        self.webapps
            .iter()
            .map(|webapp| format!("{}={}", webapp.exported_context(), webapp.directory.display()))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Same shape as [`Self::webapps_value`], only webapps with a context file.
    fn context_files_value(&self) -> String {
        self.webapps
            .iter()
            .filter_map(|webapp| {
                let file = webapp.context_file.as_ref()?;
                Some(format!("{}={}", webapp.exported_context(), file.display()))
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Command-backed container
// ---------------------------------------------------------------------------

enum ProcessState {
    Idle,
    Running(Child),
    Stopped,
}

/// Runs an external server process, handing it the registered connectors
/// and webapps through environment variables.
pub struct CommandContainer {
    command: ServerCommand,
    port: Option<u16>,
    working_directory: PathBuf,
    current_directory: PathBuf,
    registrations: Registrations,
    state: Mutex<ProcessState>,
    changed: Condvar,
}

impl CommandContainer {
    pub fn new(command: ServerCommand, config: &LauncherConfig) -> Self {
        Self {
            command,
            port: config.default_port,
            working_directory: server_dir(&config.working_directory),
            current_directory: config.project_directory.clone(),
            registrations: Registrations::default(),
            state: Mutex::new(ProcessState::Idle),
            changed: Condvar::new(),
        }
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .envs(&self.command.env)
            .env(ENV_CONNECTORS, self.registrations.connectors_value())
            .env(ENV_WEBAPPS, self.registrations.webapps_value())
            .env(ENV_CONTEXT_FILES, self.registrations.context_files_value())
            .env(ENV_WORKING_DIRECTORY, &self.working_directory)
            .current_dir(&self.current_directory);
        if let Some(port) = self.port {
            command.env(ENV_PORT, port.to_string());
        }
        command
    }
}

impl Container for CommandContainer {
    fn add_connector(&mut self, connector: ConnectorConfig) {
        self.registrations.connectors.push(connector);
    }

    fn add_webapp(&mut self, context_path: &str, directory: &Path, context_file: Option<&Path>) {
        self.registrations
            .webapps
            .push(WebappRegistration::new(context_path, directory, context_file));
    }

    fn start(&self) -> Result<(), LaunchError> {
        let mut state = lock(&self.state);
        if !matches!(*state, ProcessState::Idle) {
            return Err(LaunchError::Container("server already started".to_string()));
        }
        let child = self
            .build_command()
            .spawn()
            .map_err(|e| io_err(&self.command.program, e))?;
        tracing::info!(
            program = %self.command.program,
            pid = child.id(),
            port = ?self.port,
            "server process started",
        );
        *state = ProcessState::Running(child);
        self.changed.notify_all();
        Ok(())
    }

    fn stop(&self) -> Result<(), LaunchError> {
        let mut state = lock(&self.state);
        if let ProcessState::Running(child) = &mut *state {
            let pid = child.id();
            if let Err(err) = child.kill() {
                // Already exited; reaping below still applies.
                tracing::debug!(pid, error = %err, "kill failed");
            }
            let status = child
                .wait()
                .map_err(|e| io_err(&self.command.program, e))?;
            tracing::info!(pid, status = %status, "server process stopped");
        }
        *state = ProcessState::Stopped;
        self.changed.notify_all();
        Ok(())
    }

    fn await_termination(&self) -> Result<(), LaunchError> {
        let mut state = lock(&self.state);
        loop {
            match &mut *state {
                ProcessState::Stopped => return Ok(()),
                ProcessState::Idle => {
                    state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
                ProcessState::Running(child) => {
                    match child.try_wait().map_err(|e| io_err(&self.command.program, e))? {
                        Some(status) => {
                            tracing::info!(status = %status, "server process exited");
                            *state = ProcessState::Stopped;
                            self.changed.notify_all();
                            return Ok(());
                        }
                        None => {
                            state = self
                                .changed
                                .wait_timeout(state, EXIT_POLL_INTERVAL)
                                .unwrap_or_else(PoisonError::into_inner)
                                .0;
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Standby container
// ---------------------------------------------------------------------------

/// Used when no server command is configured: holds the registrations and
/// stays "running" until stopped, which keeps sync sessions and the
/// shutdown listener alive.
#[derive(Default)]
pub struct StandbyContainer {
    registrations: Registrations,
    stopped: Mutex<bool>,
    changed: Condvar,
}

impl StandbyContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Container for StandbyContainer {
    fn add_connector(&mut self, connector: ConnectorConfig) {
        self.registrations.connectors.push(connector);
    }

    fn add_webapp(&mut self, context_path: &str, directory: &Path, context_file: Option<&Path>) {
        self.registrations
            .webapps
            .push(WebappRegistration::new(context_path, directory, context_file));
    }

    fn start(&self) -> Result<(), LaunchError> {
        tracing::info!(
            connectors = %self.registrations.connectors_value(),
            webapps = %self.registrations.webapps_value(),
            "no server command configured, standing by",
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), LaunchError> {
        *lock(&self.stopped) = true;
        self.changed.notify_all();
        Ok(())
    }

    fn await_termination(&self) -> Result<(), LaunchError> {
        let mut stopped = lock(&self.stopped);
        while !*stopped {
            stopped = self.changed.wait(stopped).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

/// Pick the container for a configuration: an external command when one is
/// configured, otherwise [`StandbyContainer`].
pub fn container_from_config(config: &LauncherConfig) -> Box<dyn Container> {
    match &config.server {
        Some(command) => Box::new(CommandContainer::new(command.clone(), config)),
        None => Box::new(StandbyContainer::new()),
    }
}
