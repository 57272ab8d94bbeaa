//! `devlauncher config`: show the configuration a launch would use.

use anyhow::{Context, Result};
use clap::Args;
use devlauncher_core::LauncherConfig;

use super::ConfigSource;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub source: ConfigSource,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load()?;
        if self.json {
            let rendered =
                serde_json::to_string_pretty(&config).context("failed to render configuration")?;
            println!("{rendered}");
        } else {
            print_text(&config);
        }
        Ok(())
    }
}

fn print_text(config: &LauncherConfig) {
    println!("project directory:  {}", config.project_directory.display());
    match &config.configuration_file {
        Some(file) => println!("configuration file: {}", file.display()),
        None => println!("configuration file: (none)"),
    }
    println!("working directory:  {}", config.working_directory.display());
    match config.default_port {
        Some(port) => println!("default port:       {port}"),
        None => println!("default port:       (none)"),
    }
    println!("shutdown:           {}", config.shutdown);
    match &config.server {
        Some(server) => println!("server:             {} {}", server.program, server.args.join(" ")),
        None => println!("server:             (standby)"),
    }
    for connector in &config.connectors {
        println!("connector:          {connector}");
    }
    for webapp in &config.webapps {
        println!("webapp:             {}", display_context(&webapp.context_path()));
    }
    for webapp in &config.generated_webapps {
        println!(
            "generated webapp:   {} ({} source(s))",
            display_context(&webapp.context_path()),
            webapp.sources.len()
        );
    }
    for copy in &config.copy_resources {
        println!("copy resources:     -> {}", copy.target.display());
    }
}

fn display_context(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
