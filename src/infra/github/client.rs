//! GitHub REST client for the contents API.

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::json;

use super::error::{GitHubError, Result};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "partdb";

/// Characters escaped inside one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// A new file committed directly to a branch.
#[derive(Debug, Clone, Copy)]
pub struct CreateFileRequest<'a> {
    /// Repository-relative path with forward slashes.
    pub path: &'a str,
    pub branch: &'a str,
    pub message: &'a str,
    pub content: &'a [u8],
}

/// Creates files on the remote repository.
pub trait ContentsClient: Send + Sync {
    fn create_file(&self, req: CreateFileRequest<'_>) -> impl Future<Output = Result<()>> + Send;
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE, token, owner, repo)
    }

    /// Client against a different API root, e.g. GitHub Enterprise or a test server.
    pub fn with_base_url(api_base: &str, token: &str, owner: &str, repo: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(GitHubError::Transport)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }
}

impl ContentsClient for GitHubClient {
    async fn create_file(&self, req: CreateFileRequest<'_>) -> Result<()> {
        let url = self.contents_url(req.path);
        let body = json!({
            "message": req.message,
            "content": STANDARD.encode(req.content),
            "branch": req.branch,
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(GitHubError::Transport)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(path = req.path, status = status.as_u16(), "created file on GitHub");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(GitHubError::from_status(status.as_u16(), &text).into())
    }
}
