use std::path::Path;

use chrono::{DateTime, Utc};

use super::error::Result;

/// One `status --porcelain` or `diff --name-status` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Status letters, e.g. `M`, `??`, `R100`.
    pub flag: String,
    pub path: String,
}

/// Commit counts of `HEAD...<upstream>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AheadBehind {
    pub ahead: u32,
    pub behind: u32,
}

impl AheadBehind {
    pub fn is_even(&self) -> bool {
        self.ahead == 0 && self.behind == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    /// `YYYY-MM-DD HH:MM`, author date without time zone.
    pub date: String,
    pub author: String,
    pub subject: String,
}

/// Version control operations on the database working copy.
///
/// Implementations serialize every call against the repository, so callers
/// on different threads never race on refs.
pub trait GitFacade: Send + Sync {
    fn repo_path(&self) -> &Path;

    /// `git fetch <remote> <branch>`.
    fn fetch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Working tree and index changes.
    fn status(&self) -> Result<Vec<StatusEntry>>;

    /// Changes between two revisions, optionally limited to some paths.
    fn diff_name_status(&self, from: &str, to: &str, paths: &[&str]) -> Result<Vec<StatusEntry>>;

    /// Commits only on `HEAD` (ahead) and only on `upstream` (behind).
    fn ahead_behind(&self, upstream: &str) -> Result<AheadBehind>;

    fn merge_ff_only(&self, upstream: &str) -> Result<()>;

    fn rebase_onto(&self, upstream: &str) -> Result<()>;

    fn push(&self, remote: &str, branch: &str) -> Result<()>;

    /// Content of `path` at `rev`.
    fn read_blob(&self, rev: &str, path: &str) -> Result<String>;

    fn object_exists(&self, rev: &str, path: &str) -> Result<bool>;

    /// Full commit id of `rev`.
    fn rev_parse(&self, rev: &str) -> Result<String>;

    /// Modification time of `FETCH_HEAD`. `None` if the repository was never fetched.
    fn fetch_marker_mtime(&self) -> Result<Option<DateTime<Utc>>>;

    /// Time since the last fetch, clamped at zero.
    fn fetch_marker_age(&self, now: DateTime<Utc>) -> Result<Option<chrono::Duration>> {
        Ok(self
            .fetch_marker_mtime()?
            .map(|mtime| (now - mtime).max(chrono::Duration::zero())))
    }

    /// Tip of `refs/heads/<branch>` on the remote. Network call with a short timeout.
    fn ls_remote_head(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    /// Latest commits touching `path`, newest first.
    fn log_for_path(&self, rev: Option<&str>, path: &str, limit: usize) -> Result<Vec<CommitSummary>>;
}
