//! `devlauncher sync`: mirror a directory, optionally keeping it live.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use devlauncher_sync::{sync_directory, FileFilter, SyncSession};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory to mirror from.
    pub source: PathBuf,

    /// Directory to mirror into (created if missing).
    pub target: PathBuf,

    /// Keep mirroring changes until Ctrl-C.
    #[arg(long)]
    pub watch: bool,

    /// Only copy files with this extension (repeatable).
    #[arg(long = "include", value_name = "EXT")]
    pub include: Vec<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        if !self.source.is_dir() {
            bail!("source directory not found: {}", self.source.display());
        }
        let filter = FileFilter::extensions(&self.include);

        if !self.watch {
            let copied = sync_directory(&self.source, &self.target, &filter)
                .with_context(|| format!("sync failed for '{}'", self.source.display()))?;
            println!("copied {copied} file(s) into {}", self.target.display());
            return Ok(());
        }

        let session = SyncSession::create(&self.source, &self.target, Some(filter))
            .with_context(|| format!("cannot watch '{}'", self.source.display()))?;
        println!(
            "copied {} file(s); watching {} -> {} (Ctrl-C to stop)",
            session.initial_copies(),
            self.source.display(),
            self.target.display(),
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start runtime")?;
        runtime
            .block_on(tokio::signal::ctrl_c())
            .context("ctrl-c handler failed")?;

        session.close();
        Ok(())
    }
}
