//! Launcher runtime: shutdown handshake, container collaborator, customizer
//! hooks, and the launch lifecycle that ties them together.

pub mod container;
pub mod customizer;
mod error;
pub mod launcher;
pub mod protocol;
pub mod shutdown;

pub use container::{container_from_config, CommandContainer, Container, StandbyContainer};
pub use customizer::{
    customizers_from_config, ConnectorCustomizer, CopyResourcesCustomizer, Customizer,
    GeneratedWebappCustomizer, LaunchContext, WebappCustomizer,
};
pub use error::LaunchError;
pub use launcher::{init_tracing, Launcher};
pub use protocol::{shutdown_existing_server, ProbeOutcome};
pub use shutdown::{
    await_container, ProcessExit, ShutdownCoordinator, ShutdownPhase, ShutdownServer, StdProcessExit,
};
