//! Launch lifecycle: replace a previous instance, customize and start the
//! container, then serve the shutdown port until the container terminates.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use devlauncher_core::paths::server_dir;
use devlauncher_core::LauncherConfig;
use devlauncher_sync::SyncSession;

use crate::container::{container_from_config, Container};
use crate::customizer::{customizers_from_config, Customizer, LaunchContext};
use crate::error::{io_err, LaunchError};
use crate::shutdown::{await_container, ProcessExit, ShutdownCoordinator, StdProcessExit};

pub struct Launcher {
    config: LauncherConfig,
    container: Option<Box<dyn Container>>,
    customizers: Vec<Box<dyn Customizer>>,
    exit: Arc<dyn ProcessExit>,
}

impl Launcher {
    /// A launcher with the hooks implied by `config`.
    pub fn new(config: LauncherConfig) -> Self {
        let customizers = customizers_from_config(&config);
        Self {
            config,
            container: None,
            customizers,
            exit: Arc::new(StdProcessExit),
        }
    }

    /// Use `container` instead of the one the configuration implies.
    pub fn with_container(mut self, container: Box<dyn Container>) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_process_exit(mut self, exit: Arc<dyn ProcessExit>) -> Self {
        self.exit = exit;
        self
    }

    /// Runs after the configured hooks.
    pub fn with_customizer(mut self, customizer: Box<dyn Customizer>) -> Self {
        self.customizers.push(customizer);
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub async fn launch(self) -> Result<(), LaunchError> {
        let Launcher {
            config,
            container,
            customizers,
            exit,
        } = self;

        match &config.configuration_file {
            Some(path) => tracing::info!(path = %path.display(), "using configuration file"),
            None => tracing::info!("no configuration file, using defaults"),
        }

        let coordinator = ShutdownCoordinator::new(config.shutdown).with_process_exit(exit);
        let probe = coordinator.shutdown_existing_server().await;
        if probe.found_server() {
            tracing::info!(shutdown = %config.shutdown, "previous instance shut down");
        }

        ensure_dir(&config.working_directory)?;
        ensure_dir(&server_dir(&config.working_directory))?;

        let mut container = container.unwrap_or_else(|| container_from_config(&config));
        let mut sessions: Vec<SyncSession> = Vec::new();
        for customizer in &customizers {
            tracing::debug!(customizer = customizer.name(), "running customizer");
            let mut ctx = LaunchContext {
                container: container.as_mut(),
                config: &config,
                sessions: &mut sessions,
            };
            customizer
                .customize(&mut ctx)
                .map_err(|source| LaunchError::Customizer {
                    name: customizer.name().to_string(),
                    source: Box::new(source),
                })?;
        }

        let container: Arc<dyn Container> = Arc::from(container);
        container.start()?;
        tracing::info!(
            port = ?config.default_port,
            shutdown = %config.shutdown,
            sessions = sessions.len(),
            "server started",
        );

        let server = match coordinator.install_after_probe(container.clone(), probe).await {
            Ok(server) => server,
            Err(err) => {
                if let Err(stop_err) = container.stop() {
                    tracing::warn!(error = %stop_err, "cannot stop server after failed launch");
                }
                return Err(err);
            }
        };

        await_container(container).await?;
        close_sessions(sessions).await?;

        if let Some(server) = server {
            server.finish().await?;
        }
        Ok(())
    }

    /// Launch on a fresh multi-thread runtime and block until done.
    pub fn launch_blocking(self) -> Result<(), LaunchError> {
        init_tracing(false);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| io_err("tokio-runtime", e))?;
        runtime.block_on(self.launch())
    }
}

async fn close_sessions(sessions: Vec<SyncSession>) -> Result<(), LaunchError> {
    if sessions.is_empty() {
        return Ok(());
    }
    let closing = tokio::task::spawn_blocking(move || {
        for session in &sessions {
            session.close();
        }
        sessions.len()
    });
    match closing.await {
        Ok(closed) => {
            tracing::debug!(closed, "sync sessions closed");
            Ok(())
        }
        Err(err) => Err(LaunchError::Join {
            task: "close_sessions",
            message: err.to_string(),
        }),
    }
}

fn ensure_dir(path: &Path) -> Result<(), LaunchError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` applies unless `verbose` forces
/// debug output. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
