mod common;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use devlauncher_core::{
    CopyDefinition, GeneratedWebappConfig, LauncherConfig, ShutdownEndpoint, WebappConfig,
};
use devlauncher_runtime::{shutdown_existing_server, LaunchError, Launcher, ProbeOutcome};
use tempfile::TempDir;

use common::{eventually, free_port, wait_for_listener, CountingContainer, RecordingExit};

fn generated_config(project: &TempDir, port: u16) -> LauncherConfig {
    let mut config = LauncherConfig::new(project.path(), project.path().join("work"));
    config.shutdown = ShutdownEndpoint::new(Some(port));
    config.generated_webapps.push(GeneratedWebappConfig {
        context: String::new(),
        target_directory: None,
        sources: vec![CopyDefinition {
            source: PathBuf::from("web"),
            target_subdirectory: None,
            include: Vec::new(),
        }],
    });
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launch_mirrors_sources_until_shutdown_command() {
    let project = TempDir::new().expect("project");
    fs::create_dir_all(project.path().join("web")).expect("mkdir");
    fs::write(project.path().join("web/index.html"), "<h1/>").expect("write");
    let port = free_port();
    let exit = RecordingExit::new();
    let container = CountingContainer::new();

    let launcher = Launcher::new(generated_config(&project, port))
        .with_container(Box::new(container.clone()))
        .with_process_exit(exit.clone());
    let launching = tokio::spawn(launcher.launch());

    let webapp = project.path().join("work/webapps/ROOT");
    let source = project.path().join("web");
    let outcome = tokio::task::spawn_blocking(move || {
        wait_for_listener(port);
        assert!(webapp.join("index.html").exists());

        fs::write(source.join("live.css"), "p{}").expect("write live");
        eventually("live copy", || webapp.join("live.css").exists());

        shutdown_existing_server(&ShutdownEndpoint::new(Some(port)))
    })
    .await
    .expect("client");

    assert_eq!(outcome, ProbeOutcome::Confirmed);
    launching.await.expect("join").expect("launch");
    assert_eq!(container.starts(), 1);
    assert_eq!(container.stops(), 1);
    assert_eq!(exit.codes(), vec![0]);
    assert_eq!(container.webapps().len(), 1);
    assert!(project.path().join("work/server").is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_customizer_aborts_before_start() {
    let project = TempDir::new().expect("project");
    let mut config = LauncherConfig::new(project.path(), project.path().join("work"));
    config.shutdown = ShutdownEndpoint::disabled();
    config.webapps.push(WebappConfig::new("missing"));
    let container = CountingContainer::new();

    let err = Launcher::new(config)
        .with_container(Box::new(container.clone()))
        .with_process_exit(RecordingExit::new())
        .launch()
        .await
        .expect_err("missing webapp directory");

    assert!(matches!(err, LaunchError::Customizer { ref name, .. } if name == "webapp"));
    assert_eq!(container.starts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_shutdown_port_follows_container_lifetime() {
    let project = TempDir::new().expect("project");
    let mut config = LauncherConfig::new(project.path(), project.path().join("work"));
    config.shutdown = ShutdownEndpoint::disabled();
    let exit = RecordingExit::new();
    let container = CountingContainer::new();

    let launching = tokio::spawn(
        Launcher::new(config)
            .with_container(Box::new(container.clone()))
            .with_process_exit(exit.clone())
            .launch(),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!launching.is_finished());

    container.terminate();
    launching.await.expect("join").expect("launch");

    assert_eq!(container.starts(), 1);
    assert!(exit.codes().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_launch_replaces_first() {
    let project = TempDir::new().expect("project");
    fs::create_dir_all(project.path().join("web")).expect("mkdir");
    let port = free_port();
    let first_exit = RecordingExit::new();
    let first = CountingContainer::new();
    let second = CountingContainer::new();

    let first_launch = tokio::spawn(
        Launcher::new(generated_config(&project, port))
            .with_container(Box::new(first.clone()))
            .with_process_exit(first_exit.clone())
            .launch(),
    );
    tokio::task::spawn_blocking(move || wait_for_listener(port))
        .await
        .expect("wait");

    let second_exit = RecordingExit::new();
    let second_launch = tokio::spawn(
        Launcher::new(generated_config(&project, port))
            .with_container(Box::new(second.clone()))
            .with_process_exit(second_exit.clone())
            .launch(),
    );

    first_launch.await.expect("join first").expect("first launch");
    assert_eq!(first.stops(), 1);
    assert_eq!(first_exit.codes(), vec![0]);

    let waiter = second.clone();
    tokio::task::spawn_blocking(move || eventually("second start", || waiter.starts() == 1))
        .await
        .expect("wait");
    second.terminate();
    second_launch.await.expect("join second").expect("second launch");
    assert_eq!(second_exit.codes(), vec![0]);
}
