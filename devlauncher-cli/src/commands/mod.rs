pub mod config;
pub mod run;
pub mod stop;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use devlauncher_core::LauncherConfig;

/// Options shared by commands that read the launcher configuration.
#[derive(Args, Debug, Default)]
pub struct ConfigSource {
    /// Configuration file (default: devlauncher.yaml in the project directory).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Project directory (default: the current directory).
    #[arg(long)]
    pub project_dir: Option<PathBuf>,
}

impl ConfigSource {
    pub fn load(&self) -> Result<LauncherConfig> {
        devlauncher_core::load(self.config.as_deref(), self.project_dir.as_deref())
            .context("failed to load configuration")
    }
}
