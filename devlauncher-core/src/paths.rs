use std::path::{Path, PathBuf};

pub const DEFAULT_WORKING_DIRECTORY_NAME: &str = ".devlauncher";
pub const DEFAULT_CONFIGURATION_FILE: &str = "devlauncher.yaml";
pub const DEFAULT_WEBAPP_DIRECTORY: &str = "src/main/webapp";
pub const DEFAULT_RESOURCES_DIRECTORY: &str = "src/main/resources";
pub const ROOT_CONTEXT_DIRECTORY: &str = "ROOT";

pub fn default_working_directory(home: &Path) -> PathBuf {
    home.join(DEFAULT_WORKING_DIRECTORY_NAME)
}

/// Scratch space handed to the container process.
pub fn server_dir(working: &Path) -> PathBuf {
    working.join("server")
}

pub fn generated_webapps_dir(working: &Path) -> PathBuf {
    working.join("webapps")
}

/// `<working>/webapps/<context>`; the root context maps to `ROOT`.
pub fn generated_webapp_dir(working: &Path, context: &str) -> PathBuf {
    let name = context.trim_matches('/');
    let name = if name.is_empty() {
        ROOT_CONTEXT_DIRECTORY
    } else {
        name
    };
    generated_webapps_dir(working).join(name)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
