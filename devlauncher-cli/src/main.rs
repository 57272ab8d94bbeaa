//! devlauncher: a development launcher with single-instance restarts and
//! live resource mirroring.
//!
//! # Usage
//!
//! ```text
//! devlauncher [--verbose] run [--config <file>] [--project-dir <dir>]
//! devlauncher [--verbose] stop [--port <n>]
//! devlauncher [--verbose] sync <source> <target> [--watch] [--include <ext>]...
//! devlauncher [--verbose] config [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, run::RunArgs, stop::StopArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "devlauncher",
    version,
    about = "Launch a development server, replacing any previous instance",
    long_about = None,
)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stop any previous instance, start the server, and wait for it.
    Run(RunArgs),

    /// Ask a running instance to shut down.
    Stop(StopArgs),

    /// Mirror a directory once, or keep mirroring with --watch.
    Sync(SyncArgs),

    /// Print the resolved configuration.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    devlauncher_runtime::init_tracing(cli.verbose);
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
