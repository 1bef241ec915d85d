use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;

use super::paths;
use crate::infra::git::{GitHubRemote, parse_github_url};

/// Repository-local overlay, relative to the database root.
pub const REPO_OVERLAY_PATH: &str = "Database/partdb.yaml";

const MIN_STALE_MINUTES: u32 = 1;
const MAX_STALE_MINUTES: u32 = 24 * 60;

/// Top-level configuration for partdb.
#[derive(Debug, Default, Clone, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the part database working copy. Discovered from the current
    /// directory when unset.
    #[serde(default)]
    pub repo_path: Option<PathBuf>,

    /// Where change requests are committed.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Background fetch and staleness settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Default, Clone, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    /// Repository URL, e.g. `https://github.com/acme/parts` or `acme/parts@main`.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Repository owner. Overrides the owner in `remote_url`.
    #[serde(default)]
    pub owner: Option<String>,

    /// Repository name. Overrides the name in `remote_url`.
    #[serde(default)]
    pub repo: Option<String>,

    /// Branch CI watches for requests (default: branch in `remote_url`, else "main").
    #[serde(default)]
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Minutes after which a fetch is considered stale, 1 to 1440 (default: 5).
    #[serde(default = "default_stale_minutes")]
    #[schemars(default = "default_stale_minutes")]
    pub stale_minutes: u32,

    /// Seconds between background fetches in `partdb watch` (default: 60).
    #[serde(default = "default_fetch_interval_secs")]
    #[schemars(default = "default_fetch_interval_secs")]
    pub fetch_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_minutes: default_stale_minutes(),
            fetch_interval_secs: default_fetch_interval_secs(),
        }
    }
}

fn default_stale_minutes() -> u32 {
    5
}

fn default_fetch_interval_secs() -> u64 {
    60
}

/// Settings a database repository may carry for everyone who clones it.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct RepoOverlay {
    #[serde(default)]
    github: RepoOverlayGitHub,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct RepoOverlayGitHub {
    #[serde(default)]
    remote_url: Option<String>,
    #[serde(default)]
    base_branch: Option<String>,
}

impl Config {
    /// Staleness threshold, clamped to [1, 1440] minutes.
    pub fn stale_threshold(&self) -> chrono::Duration {
        let minutes = self
            .sync
            .stale_minutes
            .clamp(MIN_STALE_MINUTES, MAX_STALE_MINUTES);
        chrono::Duration::minutes(i64::from(minutes))
    }

    pub fn fetch_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.fetch_interval_secs.max(1))
    }

    fn remote(&self) -> Option<GitHubRemote> {
        let url = self.github.remote_url.as_deref()?;
        match parse_github_url(url) {
            Ok(remote) => Some(remote),
            Err(e) => {
                tracing::warn!("ignoring github.remote_url: {e:#}");
                None
            }
        }
    }

    pub fn base_branch(&self) -> String {
        self.github
            .base_branch
            .clone()
            .filter(|b| !b.trim().is_empty())
            .or_else(|| self.remote().and_then(|r| r.branch))
            .unwrap_or_else(|| "main".to_string())
    }

    /// `(owner, repo)` of the request repository, if configured.
    pub fn owner_repo(&self) -> Option<(String, String)> {
        let remote = self.remote();
        let owner = self
            .github
            .owner
            .clone()
            .or_else(|| remote.as_ref().map(|r| r.owner.clone()))?;
        let repo = self
            .github
            .repo
            .clone()
            .or_else(|| remote.as_ref().map(|r| r.repo.clone()))?;
        Some((owner, repo))
    }

    /// Apply the repository overlay. Its values win over the user config.
    fn with_overlay(mut self, overlay: RepoOverlay) -> Self {
        if let Some(url) = overlay.github.remote_url {
            self.github.remote_url = Some(url);
            self.github.owner = None;
            self.github.repo = None;
        }
        if let Some(branch) = overlay.github.base_branch {
            self.github.base_branch = Some(branch);
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file (permission error, etc.)
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parse error
    #[error("Invalid config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },
}

/// Load configuration from ~/.config/partdb/config.ya?ml.
/// Returns Config::default() if no config file exists.
pub fn load_config() -> anyhow::Result<Config> {
    let Some(dir) = paths::config_base() else {
        return Ok(Config::default());
    };
    load_config_from_dir(&dir)
}

/// Searches for config.yaml, then config.yml in the given directory.
pub fn load_config_from_dir(dir: &Path) -> anyhow::Result<Config> {
    for filename in &["config.yaml", "config.yml"] {
        let path = dir.join(filename);
        match read_optional(&path)? {
            Some(content) => return parse_yaml(&content, &path),
            None => continue,
        }
    }
    Ok(Config::default())
}

/// User config with the repository overlay applied.
pub fn load_effective(config: Config, repo_root: &Path) -> anyhow::Result<Config> {
    let path = repo_root.join(REPO_OVERLAY_PATH);
    match read_optional(&path)? {
        Some(content) => Ok(config.with_overlay(parse_yaml(&content, &path)?)),
        None => Ok(config),
    }
}

fn read_optional(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned + Default>(
    content: &str,
    path: &Path,
) -> anyhow::Result<T> {
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(content)
        .map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
        .map_err(Into::into)
}

/// Generate JSON Schema for the Config struct.
pub fn generate_schema() -> schemars::Schema {
    schemars::schema_for!(Config)
}
