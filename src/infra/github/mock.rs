//! wiremock-based GitHub mock server for testing.
//!
//! ```ignore
//! let mock = GitHubMockServer::start().await;
//! mock.repo("owner", "repo").contents("Requests/a.json").create().await;
//! mock.repo("owner", "repo").contents("Requests/a.json").fail(401, "{}").await;
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::client::GitHubClient;

pub const TEST_TOKEN: &str = "test-token";

pub struct GitHubMockServer {
    server: MockServer,
}

impl GitHubMockServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client pointed at this server.
    pub fn client(&self, owner: &str, repo: &str) -> GitHubClient {
        GitHubClient::with_base_url(&self.server.uri(), TEST_TOKEN, owner, repo).unwrap()
    }

    pub fn repo<'a>(&'a self, owner: &'a str, repo: &'a str) -> MockRepoContext<'a> {
        MockRepoContext {
            server: &self.server,
            owner,
            repo,
        }
    }
}

pub struct MockRepoContext<'a> {
    server: &'a MockServer,
    owner: &'a str,
    repo: &'a str,
}

impl MockRepoContext<'_> {
    pub fn contents<'b>(&'b self, file: &'b str) -> MockContentsBuilder<'b> {
        MockContentsBuilder {
            ctx: self,
            file,
            expected: None,
        }
    }

    /// Accept exactly one request file under `Requests/`, whatever its name.
    pub async fn accept_request_file(&self) {
        let route = format!(
            r"^/repos/{}/{}/contents/Requests/[^/]+\.json$",
            self.owner, self.repo
        );
        Mock::given(method("PUT"))
            .and(path_regex(route))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"content": {}})))
            .expect(1)
            .mount(self.server)
            .await;
    }
}

pub struct MockContentsBuilder<'a> {
    ctx: &'a MockRepoContext<'a>,
    file: &'a str,
    expected: Option<serde_json::Value>,
}

impl MockContentsBuilder<'_> {
    fn route(&self) -> String {
        format!(
            "/repos/{}/{}/contents/{}",
            self.ctx.owner, self.ctx.repo, self.file
        )
    }

    /// Only match requests carrying this content on this branch.
    pub fn expect_content(mut self, content: &[u8], branch: &str) -> Self {
        self.expected = Some(json!({
            "content": STANDARD.encode(content),
            "branch": branch,
        }));
        self
    }

    /// Mock a successful PUT, expected exactly once.
    pub async fn create(self) {
        let mut mock = Mock::given(method("PUT"))
            .and(path(self.route()))
            .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .and(header("x-github-api-version", "2022-11-28"));
        if let Some(expected) = self.expected {
            mock = mock.and(body_partial_json(expected));
        }
        mock.respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "content": {"path": self.file},
            "commit": {"sha": "0123456789abcdef0123456789abcdef01234567"},
        })))
        .expect(1)
        .mount(self.ctx.server)
        .await;
    }

    /// Mock a failing PUT.
    pub async fn fail(self, status: u16, body: &str) {
        Mock::given(method("PUT"))
            .and(path(self.route()))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(self.ctx.server)
            .await;
    }
}
