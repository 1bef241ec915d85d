//! GitHub remote URL parsing.

use regex::Regex;
use std::sync::LazyLock;

use super::error::{GitError, Result};

#[expect(clippy::unwrap_used, reason = "static pattern")]
static GITHUB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[:/]([^/\s]+)/([^/\s]+?)(?:\.git)?(?:/tree/([^\s]+?))?/?$").unwrap()
});

#[expect(clippy::unwrap_used, reason = "static pattern")]
static SHORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:@(\S+))?$").unwrap()
});

/// Repository coordinates parsed from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRemote {
    pub owner: String,
    pub repo: String,
    /// Branch named in the URL (`/tree/<branch>` or `owner/repo@branch`).
    pub branch: Option<String>,
}

/// Parse a GitHub remote.
///
/// Accepts `https://github.com/owner/repo(.git)`, `git@github.com:owner/repo.git`,
/// `https://github.com/owner/repo/tree/<branch>` and `owner/repo@branch`.
pub fn parse_github_url(url: &str) -> Result<GitHubRemote> {
    let url = url.trim();
    let captures = GITHUB_URL_RE
        .captures(url)
        .or_else(|| SHORT_RE.captures(url))
        .ok_or_else(|| GitError::InvalidGitHubUrl(url.to_string()))?;

    let part = |i: usize| captures.get(i).map(|m| m.as_str().to_string());
    match (part(1), part(2)) {
        (Some(owner), Some(repo)) => Ok(GitHubRemote {
            owner,
            repo,
            branch: part(3).filter(|b| !b.is_empty()),
        }),
        _ => Err(GitError::InvalidGitHubUrl(url.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::https("https://github.com/acme/parts.git", "acme", "parts", None)]
    #[case::https_no_git("https://github.com/acme/parts", "acme", "parts", None)]
    #[case::ssh("git@github.com:acme/parts.git", "acme", "parts", None)]
    #[case::tree("https://github.com/acme/parts/tree/release/v2", "acme", "parts", Some("release/v2"))]
    #[case::short("acme/parts", "acme", "parts", None)]
    #[case::short_branch("acme/parts@dev", "acme", "parts", Some("dev"))]
    fn test_parse_github_url(
        #[case] url: &str,
        #[case] owner: &str,
        #[case] repo: &str,
        #[case] branch: Option<&str>,
    ) {
        let remote = parse_github_url(url).unwrap();
        assert_eq!(remote.owner, owner);
        assert_eq!(remote.repo, repo);
        assert_eq!(remote.branch.as_deref(), branch);
    }

    #[rstest]
    #[case::not_github("https://gitlab.com/acme/parts.git")]
    #[case::invalid("not-a-url")]
    #[case::empty("")]
    fn test_parse_github_url_invalid(#[case] url: &str) {
        assert!(parse_github_url(url).is_err());
    }
}
