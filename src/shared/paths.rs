//! Per-user directories.

use std::path::PathBuf;

use super::env_var::EnvVars;

const APP_DIR: &str = "partdb";

pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// `$XDG_CACHE_HOME` or `~/.cache`. Empty values count as unset.
pub fn cache_dir() -> Option<PathBuf> {
    xdg_or_home("XDG_CACHE_HOME", ".cache")
}

/// `$XDG_CONFIG_HOME` or `~/.config`. Empty values count as unset.
pub fn config_dir() -> Option<PathBuf> {
    xdg_or_home("XDG_CONFIG_HOME", ".config")
}

fn xdg_or_home(var: &str, fallback: &str) -> Option<PathBuf> {
    match std::env::var(var).ok().filter(|v| !v.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home_dir().map(|home| home.join(fallback)),
    }
}

/// `~/.config/partdb`: config file and pending requests.
pub fn config_base() -> Option<PathBuf> {
    config_dir().map(|d| d.join(APP_DIR))
}

/// `~/.cache/partdb`, or `PARTDB_CACHE_DIR` when set.
pub fn cache_base() -> Option<PathBuf> {
    if let Some(dir) = EnvVars::load().cache_dir {
        return Some(PathBuf::from(dir));
    }
    cache_dir().map(|d| d.join(APP_DIR))
}

/// Daily-rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    cache_base().map(|d| d.join("logs"))
}

/// Last known remote branch tips, one file per repository.
pub fn remote_sha_dir() -> Option<PathBuf> {
    cache_base().map(|d| d.join("remote_sha"))
}
