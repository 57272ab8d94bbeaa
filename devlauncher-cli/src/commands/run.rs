//! `devlauncher run`: the launch lifecycle in the foreground.

use anyhow::{Context, Result};
use clap::Args;
use devlauncher_runtime::Launcher;

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ConfigSource,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        Launcher::new(config)
            .launch_blocking()
            .context("launch failed")
    }
}
