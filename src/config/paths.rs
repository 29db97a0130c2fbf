//! Directory resolution
//!
//! `XPTRACE_CONFIG_DIR` and `XPTRACE_CACHE_DIR` override the platform
//! directories from `directories::ProjectDirs`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const APP_NAME: &str = "xptrace";

/// Configuration directory
pub fn config_dir() -> PathBuf {
    resolve_dir(std::env::var("XPTRACE_CONFIG_DIR").ok(), |dirs| {
        dirs.config_dir().to_path_buf()
    })
}

/// Cache directory
pub fn cache_dir() -> PathBuf {
    resolve_dir(std::env::var("XPTRACE_CACHE_DIR").ok(), |dirs| {
        dirs.cache_dir().to_path_buf()
    })
}

/// The override if set, else the platform directory, else a temp dir
fn resolve_dir(env_override: Option<String>, pick: impl Fn(&ProjectDirs) -> PathBuf) -> PathBuf {
    match env_override.filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| pick(&dirs))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME)),
    }
}

/// Discovery snapshots, one file per cluster
pub fn discovery_cache_dir() -> PathBuf {
    cache_dir().join("discovery")
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
