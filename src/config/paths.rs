//! Configuration file location
//!
//! `FAULTCENTER_CONFIG_DIR` wins, which is how the daemon is pointed at a
//! mounted configmap volume in-cluster. Otherwise the per-user config
//! directory of the platform is used.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const CONFIG_DIR_ENV: &str = "FAULTCENTER_CONFIG_DIR";
const APP_NAME: &str = "faultcenter";
const CONFIG_FILE: &str = "config.yaml";

/// Directory holding `config.yaml`
pub fn config_dir() -> PathBuf {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => platform_config_dir(),
    }
}

/// XDG on Linux, Application Support on macOS, AppData on Windows
fn platform_config_dir() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
}

/// Path of the root configuration file
pub fn root_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Create `path` and its parents when missing
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}
