//! GitHub API error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error(
        "No GitHub token found. Set PARTDB_GITHUB_TOKEN or GITHUB_TOKEN, or log in with `gh auth login`"
    )]
    MissingToken,

    #[error("GitHub authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub repository is not configured (set github.remote_url or github.owner/github.repo)")]
    RepoNotConfigured,
}

impl GitHubError {
    /// Classify a non-success response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = api_message(body);
        match status {
            401 | 403 => Self::Auth { status, message },
            _ => Self::Api { status, message },
        }
    }
}

/// Extract `message` plus any `errors[].message` from a GitHub error body.
fn api_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let mut message = value
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let details: Vec<&str> = value
        .get("errors")
        .and_then(|e| e.as_array())
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
        .collect();
    if !details.is_empty() {
        message.push_str(&format!(" [{}]", details.join(", ")));
    }
    message
}

pub type Result<T> = anyhow::Result<T>;
