//! Shutdown handshake wire format and the client probe.
//!
//! One plain-text line each way over loopback TCP:
//!
//! ```text
//! client -> server   shutdown
//! server -> client   shutdownConfirmation
//! ```
//!
//! The server matches the command case-insensitively and closes the
//! connection after confirming.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use devlauncher_core::ShutdownEndpoint;

pub const SHUTDOWN_COMMAND: &str = "shutdown";
pub const SHUTDOWN_CONFIRMATION: &str = "shutdownConfirmation";

/// No listener is the common case on a first launch, so give up quickly.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper bound on waiting for a previous instance to finish stopping.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of asking a previous instance to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No shutdown port configured; nothing was attempted.
    Disabled,
    /// Nothing accepted the connection.
    NoServer,
    /// A previous instance stopped and confirmed.
    Confirmed,
    /// Something was listening but never confirmed.
    Unconfirmed,
}

impl ProbeOutcome {
    /// Whether a previous instance answered at all.
    pub fn found_server(self) -> bool {
        matches!(self, Self::Confirmed | Self::Unconfirmed)
    }
}

pub fn is_shutdown_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(SHUTDOWN_COMMAND)
}

/// Ask whatever listens on the endpoint to shut down. Never fails: every
/// problem is logged at debug and folded into the outcome.
pub fn shutdown_existing_server(endpoint: &ShutdownEndpoint) -> ProbeOutcome {
    let Some(addr) = endpoint.socket_addr() else {
        return ProbeOutcome::Disabled;
    };

    let stream = match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!(port = addr.port(), error = %err, "no running server to shut down");
            return ProbeOutcome::NoServer;
        }
    };

    tracing::info!(port = addr.port(), "asking running server to shut down");
    match handshake(stream) {
        Ok(true) => {
            tracing::debug!(port = addr.port(), "previous server confirmed shutdown");
            ProbeOutcome::Confirmed
        }
        Ok(false) => {
            tracing::debug!(port = addr.port(), "previous server closed without confirmation");
            ProbeOutcome::Unconfirmed
        }
        Err(err) => {
            tracing::debug!(port = addr.port(), error = %err, "shutdown handshake failed");
            ProbeOutcome::Unconfirmed
        }
    }
}

fn handshake(mut stream: TcpStream) -> io::Result<bool> {
    stream.set_read_timeout(Some(CONFIRMATION_TIMEOUT))?;
    stream.write_all(SHUTDOWN_COMMAND.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    let mut confirmed = false;
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) if line.trim() == SHUTDOWN_CONFIRMATION => confirmed = true,
            Ok(line) => tracing::trace!(line = %line, "unexpected shutdown reply"),
            // The remote process may exit before a clean close.
            Err(_) if confirmed => break,
            Err(err) => return Err(err),
        }
    }
    Ok(confirmed)
}
