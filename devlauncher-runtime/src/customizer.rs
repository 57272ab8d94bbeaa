//! Launch-time hooks run against the container before it starts.

use std::fs;

use devlauncher_core::{
    ConnectorConfig, CopyResourcesConfig, GeneratedWebappConfig, LauncherConfig, WebappConfig,
};
use devlauncher_sync::{sync_directory_with, FileFilter, SyncOptions, SyncSession};

use crate::container::Container;
use crate::error::{io_err, LaunchError};

/// What a hook gets to work with.
pub struct LaunchContext<'a> {
    pub container: &'a mut dyn Container,
    pub config: &'a LauncherConfig,
    /// Sessions parked here are closed when the launcher shuts down.
    pub sessions: &'a mut Vec<SyncSession>,
}

pub trait Customizer: Send + Sync {
    fn name(&self) -> &str;

    fn customize(&self, ctx: &mut LaunchContext<'_>) -> Result<(), LaunchError>;
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

pub struct ConnectorCustomizer {
    connectors: Vec<ConnectorConfig>,
}

impl ConnectorCustomizer {
    pub fn new(connectors: Vec<ConnectorConfig>) -> Self {
        Self { connectors }
    }
}

impl Customizer for ConnectorCustomizer {
    fn name(&self) -> &str {
        "connectors"
    }

    fn customize(&self, ctx: &mut LaunchContext<'_>) -> Result<(), LaunchError> {
        for connector in &self.connectors {
            tracing::info!(connector = %connector, "adding connector");
            ctx.container.add_connector(connector.clone());
        }
        Ok(())
    }
}

/// Serves an exploded webapp straight from its project directory.
pub struct WebappCustomizer {
    webapp: WebappConfig,
}

impl WebappCustomizer {
    pub fn new(webapp: WebappConfig) -> Self {
        Self { webapp }
    }
}

impl Customizer for WebappCustomizer {
    fn name(&self) -> &str {
        "webapp"
    }

    fn customize(&self, ctx: &mut LaunchContext<'_>) -> Result<(), LaunchError> {
        let directory = self.webapp.resolve_directory(&ctx.config.project_directory)?;
        let context_path = self.webapp.context_path();
        let context_file = self.webapp.resolve_context_file(&ctx.config.project_directory);
        match (&self.webapp.context_file, &context_file) {
            (Some(_), Some(file)) => {
                tracing::debug!(context = %context_path, file = %file.display(), "using context file")
            }
            (Some(file), None) => {
                tracing::debug!(context = %context_path, file = %file.display(), "context file not found")
            }
            _ => {}
        }
        tracing::info!(context = %context_path, path = %directory.display(), "adding webapp");
        ctx.container
            .add_webapp(&context_path, &directory, context_file.as_deref());
        Ok(())
    }
}

/// Assembles a webapp under the working directory from several source
/// trees and keeps it live with one sync session per source.
pub struct GeneratedWebappCustomizer {
    webapp: GeneratedWebappConfig,
}

impl GeneratedWebappCustomizer {
    pub fn new(webapp: GeneratedWebappConfig) -> Self {
        Self { webapp }
    }
}

impl Customizer for GeneratedWebappCustomizer {
    fn name(&self) -> &str {
        "generated-webapp"
    }

    fn customize(&self, ctx: &mut LaunchContext<'_>) -> Result<(), LaunchError> {
        let project = &ctx.config.project_directory;
        let working = &ctx.config.working_directory;
        let root = self.webapp.resolve_target(project, working);
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

        let pairs = self.webapp.resolve_pairs(project, working);
        for (definition, (source, target)) in self.webapp.sources.iter().zip(pairs) {
            let filter = FileFilter::extensions(&definition.include);
            let session = SyncSession::create(&source, &target, Some(filter))?;
            tracing::info!(
                source = %source.display(),
                target = %target.display(),
                copied = session.initial_copies(),
                "mirroring into generated webapp",
            );
            ctx.sessions.push(session);
        }

        let context_path = self.webapp.context_path();
        tracing::info!(context = %context_path, path = %root.display(), "adding generated webapp");
        ctx.container.add_webapp(&context_path, &root, None);
        Ok(())
    }
}

/// One-shot copy, typically resources into a classes directory.
pub struct CopyResourcesCustomizer {
    copy: CopyResourcesConfig,
}

impl CopyResourcesCustomizer {
    pub fn new(copy: CopyResourcesConfig) -> Self {
        Self { copy }
    }
}

impl Customizer for CopyResourcesCustomizer {
    fn name(&self) -> &str {
        "copy-resources"
    }

    fn customize(&self, ctx: &mut LaunchContext<'_>) -> Result<(), LaunchError> {
        let source = self.copy.resolve_source(&ctx.config.project_directory);
        let target = self.copy.resolve_target(&ctx.config.project_directory);
        if !source.is_dir() {
            tracing::debug!(path = %source.display(), "no resources to copy");
            return Ok(());
        }

        let options = SyncOptions {
            filter: FileFilter::extensions(&self.copy.include),
            recursive: self.copy.recursive,
            updated_only: self.copy.updated_only,
        };
        let copied = sync_directory_with(&source, &target, &options)?;
        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            copied,
            "copied resources",
        );
        Ok(())
    }
}

/// Hooks implied by a configuration, in the order they run: connectors,
/// resource copies, exploded webapps, generated webapps.
pub fn customizers_from_config(config: &LauncherConfig) -> Vec<Box<dyn Customizer>> {
    let mut customizers: Vec<Box<dyn Customizer>> = Vec::new();
    if !config.connectors.is_empty() {
        customizers.push(Box::new(ConnectorCustomizer::new(config.connectors.clone())));
    }
    for copy in &config.copy_resources {
        customizers.push(Box::new(CopyResourcesCustomizer::new(copy.clone())));
    }
    for webapp in &config.webapps {
        customizers.push(Box::new(WebappCustomizer::new(webapp.clone())));
    }
    for webapp in &config.generated_webapps {
        customizers.push(Box::new(GeneratedWebappCustomizer::new(webapp.clone())));
    }
    customizers
}
