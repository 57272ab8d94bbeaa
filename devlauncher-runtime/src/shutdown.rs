//! Single-instance shutdown coordination.
//!
//! The client role ([`ShutdownCoordinator::shutdown_existing_server`]) asks a
//! previous instance on the same loopback port to stop. The server role
//! ([`ShutdownCoordinator::install_for_server`]) listens on that port and
//! stops the container when asked.
//!
//! ## Phases
//!
//! ```text
//! Listening -> Stopping -> Stopped -> Exited
//! ```
//!
//! Stopping can be entered from a socket command or, via `finish`, from the
//! container terminating on its own. Every transition happens under one
//! async mutex, so the container is stopped at most once and the process
//! exit runs at most once. No code path takes the lock while holding it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use devlauncher_core::ShutdownEndpoint;

use crate::container::Container;
use crate::error::LaunchError;
use crate::protocol::{self, ProbeOutcome, SHUTDOWN_CONFIRMATION};

/// Status used when the container could not be stopped cleanly.
pub const FORCED_EXIT_CODE: i32 = 1;

/// How long to keep retrying the bind while a replaced instance exits.
const BIND_RETRY_ATTEMPTS: u32 = 50;
const BIND_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Pause after a failed accept. Errors such as EMFILE persist until
/// descriptors are released.
const ACCEPT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Terminates the process. Swapped out in tests.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

/// [`ProcessExit`] backed by [`std::process::exit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Listening,
    Stopping,
    Stopped,
    Exited,
}

pub struct ShutdownCoordinator {
    endpoint: ShutdownEndpoint,
    exit: Arc<dyn ProcessExit>,
}

impl ShutdownCoordinator {
    pub fn new(endpoint: ShutdownEndpoint) -> Self {
        Self {
            endpoint,
            exit: Arc::new(StdProcessExit),
        }
    }

    pub fn with_process_exit(mut self, exit: Arc<dyn ProcessExit>) -> Self {
        self.exit = exit;
        self
    }

    pub fn endpoint(&self) -> &ShutdownEndpoint {
        &self.endpoint
    }

    /// Client role. Runs the blocking probe off the async executor.
    pub async fn shutdown_existing_server(&self) -> ProbeOutcome {
        let endpoint = self.endpoint;
        match tokio::task::spawn_blocking(move || protocol::shutdown_existing_server(&endpoint))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(error = %err, "shutdown probe task failed");
                ProbeOutcome::NoServer
            }
        }
    }

    /// Server role. Binds the loopback listener and starts accepting
    /// commands in the background. Returns `None` when the mechanism is
    /// disabled. A bind failure is returned to the caller.
    pub async fn install_for_server(
        &self,
        container: Arc<dyn Container>,
    ) -> Result<Option<ShutdownServer>, LaunchError> {
        self.install(container, false).await
    }

    /// Like [`Self::install_for_server`], but tolerates the port staying
    /// busy for a few seconds while a replaced instance exits.
    pub async fn install_after_probe(
        &self,
        container: Arc<dyn Container>,
        probe: ProbeOutcome,
    ) -> Result<Option<ShutdownServer>, LaunchError> {
        self.install(container, probe.found_server()).await
    }

    /// Install the server role, block until the container terminates, then
    /// exit the process.
    pub async fn serve(&self, container: Arc<dyn Container>) -> Result<(), LaunchError> {
        let server = self.install_for_server(container.clone()).await?;
        await_container(container).await?;
        if let Some(server) = server {
            server.finish().await?;
        }
        Ok(())
    }

    async fn install(
        &self,
        container: Arc<dyn Container>,
        retry_busy: bool,
    ) -> Result<Option<ShutdownServer>, LaunchError> {
        let Some(addr) = self.endpoint.socket_addr() else {
            tracing::debug!("shutdown port disabled, not listening");
            return Ok(None);
        };

        let listener = bind(addr, retry_busy).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| LaunchError::Bind { addr, source })?;
        tracing::info!(port = local_addr.port(), "listening for shutdown commands");

        let shared = Arc::new(Shared {
            phase: Mutex::new(ShutdownPhase::Listening),
            container,
            exit: self.exit.clone(),
        });
        let (close_tx, close_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(listener, shared.clone(), close_rx));

        Ok(Some(ShutdownServer {
            local_addr,
            shared,
            close_tx: Some(close_tx),
            accept_task,
        }))
    }
}

/// Block on the container's own termination signal without stalling the
/// executor.
pub async fn await_container(container: Arc<dyn Container>) -> Result<(), LaunchError> {
    match tokio::task::spawn_blocking(move || container.await_termination()).await {
        Ok(result) => result,
        Err(err) => Err(LaunchError::Join {
            task: "await_termination",
            message: err.to_string(),
        }),
    }
}

/// Handle to a running server role.
pub struct ShutdownServer {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    close_tx: Option<oneshot::Sender<()>>,
    accept_task: JoinHandle<()>,
}

impl ShutdownServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.shared.phase.lock().await
    }

    /// Orderly exit once the container has terminated: waits for any
    /// in-flight shutdown command, exits with status 0 unless a forced exit
    /// already happened, and stops accepting connections.
    pub async fn finish(mut self) -> Result<(), LaunchError> {
        {
            let mut phase = self.shared.phase.lock().await;
            if *phase != ShutdownPhase::Exited {
                *phase = ShutdownPhase::Exited;
                tracing::info!("server terminated, exiting");
                self.shared.exit.exit(0);
            }
        }
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        (&mut self.accept_task).await.map_err(|err| LaunchError::Join {
            task: "shutdown_listener",
            message: err.to_string(),
        })
    }
}

impl Drop for ShutdownServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

struct Shared {
    phase: Mutex<ShutdownPhase>,
    container: Arc<dyn Container>,
    exit: Arc<dyn ProcessExit>,
}

async fn bind(addr: SocketAddr, retry_busy: bool) -> Result<TcpListener, LaunchError> {
    let attempts = if retry_busy { BIND_RETRY_ATTEMPTS } else { 1 };
    let mut attempt = 1;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse && attempt < attempts => {
                tracing::debug!(port = addr.port(), attempt, "shutdown port still busy");
                attempt += 1;
                tokio::time::sleep(BIND_RETRY_INTERVAL).await;
            }
            Err(source) => return Err(LaunchError::Bind { addr, source }),
        }
    }
}

/// Source of shutdown connections; a seam so accept failures can be driven
/// in tests.
trait Accept: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    fn accept(&self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

async fn accept_loop<A: Accept>(
    listener: A,
    shared: Arc<Shared>,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut close_rx => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::trace!(error = %err, "shutdown listener accept failed");
                        tokio::select! {
                            _ = &mut close_rx => break,
                            _ = tokio::time::sleep(ACCEPT_RETRY_INTERVAL) => continue,
                        }
                    }
                };
                tracing::debug!(peer = %peer, "shutdown connection accepted");
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_client(stream, shared).await {
                        tracing::debug!(error = %err, "shutdown connection error");
                    }
                });
            }
        }
    }
    tracing::trace!("shutdown listener closed");
}

async fn handle_client(stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if !protocol::is_shutdown_command(&line) {
            tracing::debug!(line = %line, "ignoring unknown shutdown-port command");
            continue;
        }

        let mut phase = shared.phase.lock().await;
        let stopped = if *phase == ShutdownPhase::Listening {
            *phase = ShutdownPhase::Stopping;
            tracing::info!("shutdown requested, stopping server");
            let container = shared.container.clone();
            match tokio::task::spawn_blocking(move || container.stop()).await {
                Ok(result) => result,
                Err(err) => Err(LaunchError::Join {
                    task: "container_stop",
                    message: err.to_string(),
                }),
            }
        } else {
            tracing::debug!(phase = ?*phase, "shutdown already handled");
            Ok(())
        };
        if stopped.is_ok() && *phase == ShutdownPhase::Stopping {
            *phase = ShutdownPhase::Stopped;
        }

        // Confirm regardless of how the stop went.
        let written = write_confirmation(&mut writer).await;

        if let Err(err) = stopped {
            tracing::error!(error = %err, "failed to stop server, forcing exit");
            *phase = ShutdownPhase::Exited;
            shared.exit.exit(FORCED_EXIT_CODE);
        }
        drop(phase);
        written?;
        break;
    }

    Ok(())
}

async fn write_confirmation(writer: &mut tokio::net::tcp::OwnedWriteHalf) -> std::io::Result<()> {
    writer.write_all(SHUTDOWN_CONFIRMATION.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    writer.shutdown().await
}
