//! Configuration loading: defaults, file parsing, environment precedence,
//! and webapp directory resolution.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use devlauncher_core::{
    config::{load_at, Overrides},
    types::{ShutdownEndpoint, WebappConfig},
    ConfigError,
};
use predicates::prelude::predicate;
use rstest::rstest;

fn overrides(vars: &[(&str, &str)]) -> Overrides {
    Overrides::from_vars(vars.iter().copied())
}

// ---------------------------------------------------------------------------
// 1. Defaults
// ---------------------------------------------------------------------------

#[test]
fn missing_file_yields_defaults_and_creates_working_directory() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");

    let config = load_at(Some(home.path()), project.path(), None, &Overrides::default())
        .expect("load");

    assert_eq!(config.default_port, Some(8080));
    assert_eq!(config.shutdown, ShutdownEndpoint::new(Some(8081)));
    assert_eq!(config.configuration_file, None);
    assert_eq!(config.working_directory, home.path().join(".devlauncher"));
    home.child(".devlauncher").assert(predicate::path::is_dir());
    assert!(config.webapps.is_empty());
    assert!(config.generated_webapps.is_empty());
}

#[test]
fn missing_home_without_working_directory_is_an_error() {
    let project = assert_fs::TempDir::new().expect("project");
    let err = load_at(None, project.path(), None, &Overrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::HomeNotFound), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. File parsing
// ---------------------------------------------------------------------------

#[test]
fn file_values_are_applied_and_paths_resolved_against_project() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    project
        .child("devlauncher.yaml")
        .write_str(
            r#"
working_directory: work
default_port: 9080
shutdown_port: 9081
server:
  program: java
  args: ["-jar", "server.jar"]
connectors:
  - port: 8009
    protocol: ajp
generated_webapps:
  - context: shop
    sources:
      - source: src/main/webapp
      - source: target/classes
        target_subdirectory: WEB-INF/classes
        include: [class, properties]
copy_resources:
  - target: target/resources
    recursive: false
"#,
        )
        .expect("write config");

    let config = load_at(Some(home.path()), project.path(), None, &Overrides::default())
        .expect("load");

    assert_eq!(config.configuration_file, Some(project.path().join("devlauncher.yaml")));
    assert_eq!(config.working_directory, project.path().join("work"));
    assert_eq!(config.default_port, Some(9080));
    assert_eq!(config.shutdown.port(), Some(9081));
    assert_eq!(config.server.as_ref().map(|s| s.program.as_str()), Some("java"));
    assert_eq!(config.connectors.len(), 1);
    assert_eq!(config.connectors[0].uri_encoding, "UTF-8");
    assert_eq!(config.generated_webapps[0].sources.len(), 2);
    assert!(config.copy_resources[0].updated_only);
    assert!(!config.copy_resources[0].recursive);
    assert_eq!(
        config.copy_resources[0].resolve_source(&config.project_directory),
        project.path().join("src/main/resources")
    );
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    fs::write(
        project.path().join("devlauncher.yaml"),
        b"default_port: [unclosed\n  - : broken",
    )
    .expect("write");

    let err = load_at(Some(home.path()), project.path(), None, &Overrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("devlauncher.yaml"), "got: {err}");
}

#[test]
fn unknown_keys_are_rejected() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    fs::write(project.path().join("devlauncher.yaml"), b"shutdown_prot: 1\n").expect("write");

    let err = load_at(Some(home.path()), project.path(), None, &Overrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    let err = load_at(
        Some(home.path()),
        project.path(),
        Some(Path::new("nope.yaml")),
        &Overrides::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn empty_file_is_treated_as_defaults() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    project.child("devlauncher.yaml").touch().expect("touch");

    let config = load_at(Some(home.path()), project.path(), None, &Overrides::default())
        .expect("load");
    assert_eq!(config.default_port, Some(8080));
    assert!(config.configuration_file.is_some());
}

// ---------------------------------------------------------------------------
// 3. Environment precedence
// ---------------------------------------------------------------------------

#[rstest]
#[case::override_wins("9999", "shutdown_port: 7000\n", Some(9999))]
#[case::empty_disables("", "shutdown_port: 7000\n", None)]
#[case::zero_disables("0", "", None)]
fn shutdown_port_override(
    #[case] env_value: &str,
    #[case] file: &str,
    #[case] expected: Option<u16>,
) {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    project.child("devlauncher.yaml").write_str(file).expect("write");

    let config = load_at(
        Some(home.path()),
        project.path(),
        None,
        &overrides(&[("DEVLAUNCHER_SHUTDOWN_PORT", env_value)]),
    )
    .expect("load");
    assert_eq!(config.shutdown.port(), expected);
}

#[rstest]
#[case::file_zero("shutdown_port: 0\n", None)]
#[case::file_value("shutdown_port: 7000\n", Some(7000))]
#[case::file_absent("default_port: 1\n", Some(8081))]
fn shutdown_port_from_file(#[case] file: &str, #[case] expected: Option<u16>) {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    project.child("devlauncher.yaml").write_str(file).expect("write");

    let config = load_at(Some(home.path()), project.path(), None, &Overrides::default())
        .expect("load");
    assert_eq!(config.shutdown.port(), expected);
}

#[test]
fn invalid_port_override_is_reported() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    let err = load_at(
        Some(home.path()),
        project.path(),
        None,
        &overrides(&[("DEVLAUNCHER_DEFAULT_PORT", "http")]),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got: {err}");
}

#[test]
fn working_directory_override_beats_file() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    let elsewhere = assert_fs::TempDir::new().expect("elsewhere");
    project
        .child("devlauncher.yaml")
        .write_str("working_directory: from-file\n")
        .expect("write");

    let target = elsewhere.path().join("state");
    let config = load_at(
        Some(home.path()),
        project.path(),
        None,
        &overrides(&[("DEVLAUNCHER_WORKING_DIRECTORY", target.to_str().expect("utf8"))]),
    )
    .expect("load");
    assert_eq!(config.working_directory, target);
    elsewhere.child("state").assert(predicate::path::is_dir());
    project.child("from-file").assert(predicate::path::missing());
}

#[test]
fn project_directory_override_moves_configuration_lookup() {
    let home = assert_fs::TempDir::new().expect("home");
    let cwd = assert_fs::TempDir::new().expect("cwd");
    let project = assert_fs::TempDir::new().expect("project");
    project
        .child("devlauncher.yaml")
        .write_str("default_port: 7070\n")
        .expect("write");

    let config = load_at(
        Some(home.path()),
        cwd.path(),
        None,
        &overrides(&[("DEVLAUNCHER_PROJECT_DIRECTORY", project.path().to_str().expect("utf8"))]),
    )
    .expect("load");
    assert_eq!(config.project_directory, project.path());
    assert_eq!(config.default_port, Some(7070));
}

// ---------------------------------------------------------------------------
// 4. Webapp directory resolution
// ---------------------------------------------------------------------------

#[test]
fn webapp_directory_derived_from_workspace_and_context() {
    let workspace = assert_fs::TempDir::new().expect("workspace");
    workspace.child("launcher").create_dir_all().expect("launcher dir");
    workspace
        .child("shop/src/main/webapp")
        .create_dir_all()
        .expect("webapp dir");

    let webapp = WebappConfig::new("shop");
    let resolved = webapp
        .resolve_directory(&workspace.path().join("launcher"))
        .expect("resolve");
    assert_eq!(resolved, workspace.path().join("shop/src/main/webapp"));
    assert_eq!(webapp.context_path(), "/shop");
}

#[test]
fn missing_webapp_directory_names_what_is_missing() {
    let workspace = assert_fs::TempDir::new().expect("workspace");
    workspace.child("shop").create_dir_all().expect("project dir");

    let webapp = WebappConfig::new("shop");
    let err = webapp
        .resolve_directory(&workspace.path().join("launcher"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingDirectory { .. }), "got: {err}");
    assert!(err.to_string().contains("webapp directory"), "got: {err}");
}

#[test]
fn explicit_webapp_directory_must_exist() {
    let project = assert_fs::TempDir::new().expect("project");
    let mut webapp = WebappConfig::new("/");
    webapp.directory = Some(PathBuf::from("web"));

    assert!(webapp.resolve_directory(project.path()).is_err());
    project.child("web").create_dir_all().expect("web");
    assert_eq!(
        webapp.resolve_directory(project.path()).expect("resolve"),
        project.path().join("web")
    );
    assert_eq!(webapp.context_path(), "");
}

#[test]
fn context_file_is_read_from_yaml_and_resolved_only_when_present() {
    let home = assert_fs::TempDir::new().expect("home");
    let project = assert_fs::TempDir::new().expect("project");
    project
        .child("devlauncher.yaml")
        .write_str("webapps:\n  - context: shop\n    directory: web\n    context_file: conf/shop.xml\n")
        .expect("write config");

    let config = load_at(Some(home.path()), project.path(), None, &Overrides::default())
        .expect("load");
    let webapp = &config.webapps[0];
    assert_eq!(webapp.context_file.as_deref(), Some(Path::new("conf/shop.xml")));
    assert_eq!(webapp.resolve_context_file(project.path()), None);

    project.child("conf/shop.xml").write_str("<Context/>").expect("write context");
    assert_eq!(
        webapp.resolve_context_file(project.path()),
        Some(project.path().join("conf/shop.xml"))
    );
}
