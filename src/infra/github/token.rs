//! GitHub token lookup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::error::{GitHubError, Result};
use crate::shared::env_var::EnvVars;
use crate::shared::paths;

const GITHUB_HOST: &str = "github.com";

#[derive(Debug, Deserialize)]
struct HostEntry {
    #[serde(default)]
    oauth_token: Option<String>,
}

/// Resolve a token from, in order: `PARTDB_GITHUB_TOKEN`, `GITHUB_TOKEN`,
/// `gh auth token`, and the GitHub CLI `hosts.yml`.
pub fn resolve_token() -> Result<String> {
    let env = EnvVars::load();
    if let Some(token) = env.github_token() {
        return Ok(token.to_string());
    }
    if let Some(token) = token_from_gh_cli() {
        return Ok(token);
    }
    gh_hosts_path()
        .and_then(|path| token_from_hosts_file(&path))
        .ok_or_else(|| GitHubError::MissingToken.into())
}

fn token_from_gh_cli() -> Option<String> {
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        tracing::debug!(
            "gh auth token failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

fn gh_hosts_path() -> Option<PathBuf> {
    let dir = match EnvVars::load().gh_config_dir {
        Some(dir) => PathBuf::from(dir),
        None => paths::config_dir()?.join("gh"),
    };
    Some(dir.join("hosts.yml"))
}

fn token_from_hosts_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let hosts: BTreeMap<String, HostEntry> = match serde_yaml::from_str(&content) {
        Ok(hosts) => hosts,
        Err(e) => {
            tracing::debug!(path = %path.display(), "unreadable gh hosts file: {e}");
            return None;
        }
    };
    hosts
        .get(GITHUB_HOST)?
        .oauth_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
