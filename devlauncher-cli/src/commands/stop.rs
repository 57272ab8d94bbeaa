//! `devlauncher stop`: send the shutdown command to a running instance.

use anyhow::Result;
use clap::Args;
use devlauncher_core::ShutdownEndpoint;
use devlauncher_runtime::{shutdown_existing_server, ProbeOutcome};

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Shutdown port to use instead of the configured one.
    #[arg(long)]
    pub port: Option<u16>,

    #[command(flatten)]
    pub source: ConfigSource,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let endpoint = match self.port {
            Some(port) => ShutdownEndpoint::new(Some(port)),
            None => self.source.load()?.shutdown,
        };

        match shutdown_existing_server(&endpoint) {
            ProbeOutcome::Disabled => println!("shutdown port is disabled; nothing to stop"),
            ProbeOutcome::NoServer => println!("no running instance on {endpoint}"),
            ProbeOutcome::Confirmed => println!("instance on {endpoint} stopped"),
            ProbeOutcome::Unconfirmed => {
                println!("instance on {endpoint} did not confirm shutdown")
            }
        }
        Ok(())
    }
}
