//! In-memory [`GitFacade`] for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::infra::git::error::GitError;
use crate::infra::git::facade::StatusEntry;
use crate::infra::git::{AheadBehind, CommitSummary, GitFacade};

pub struct FakeGit {
    repo_path: PathBuf,
    fetch_marker: Mutex<Option<DateTime<Utc>>>,
    revs: Mutex<HashMap<String, String>>,
    blobs: Mutex<HashMap<(String, String), String>>,
    objects: Mutex<HashSet<(String, String)>>,
    ahead_behind: Mutex<Option<AheadBehind>>,
    status: Mutex<Vec<StatusEntry>>,
    diff: Mutex<Vec<StatusEntry>>,
    remote_head: Mutex<Option<String>>,
    log: Mutex<Vec<CommitSummary>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("/fake/repo"),
            fetch_marker: Mutex::new(None),
            revs: Mutex::new(HashMap::new()),
            blobs: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashSet::new()),
            ahead_behind: Mutex::new(Some(AheadBehind::default())),
            status: Mutex::new(Vec::new()),
            diff: Mutex::new(Vec::new()),
            remote_head: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGit {
    pub fn at(repo_path: &Path) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn set_fetch_marker(&self, at: Option<DateTime<Utc>>) {
        *self.fetch_marker.lock().unwrap() = at;
    }

    pub fn set_rev(&self, rev: &str, sha: &str) {
        self.revs
            .lock()
            .unwrap()
            .insert(rev.to_string(), sha.to_string());
    }

    pub fn set_blob(&self, rev: &str, path: &str, content: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert((rev.to_string(), path.to_string()), content.to_string());
    }

    pub fn add_object(&self, rev: &str, path: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert((rev.to_string(), path.to_string()));
    }

    pub fn set_ahead_behind(&self, ahead: u32, behind: u32) {
        *self.ahead_behind.lock().unwrap() = Some(AheadBehind { ahead, behind });
    }

    pub fn fail_ahead_behind(&self) {
        *self.ahead_behind.lock().unwrap() = None;
    }

    pub fn set_status(&self, entries: Vec<StatusEntry>) {
        *self.status.lock().unwrap() = entries;
    }

    pub fn set_diff(&self, entries: Vec<StatusEntry>) {
        *self.diff.lock().unwrap() = entries;
    }

    pub fn set_remote_head(&self, sha: Option<&str>) {
        *self.remote_head.lock().unwrap() = sha.map(str::to_string);
    }

    pub fn set_log(&self, commits: Vec<CommitSummary>) {
        *self.log.lock().unwrap() = commits;
    }

    /// Mutating commands run so far, e.g. `fetch origin main`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GitFacade for FakeGit {
    fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn fetch(&self, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.record(format!("fetch {remote} {branch}"));
        self.set_fetch_marker(Some(Utc::now()));
        Ok(())
    }

    fn status(&self) -> anyhow::Result<Vec<StatusEntry>> {
        Ok(self.status.lock().unwrap().clone())
    }

    fn diff_name_status(&self, _from: &str, _to: &str, paths: &[&str]) -> anyhow::Result<Vec<StatusEntry>> {
        Ok(self
            .diff
            .lock()
            .unwrap()
            .iter()
            .filter(|e| paths.is_empty() || paths.contains(&e.path.as_str()))
            .cloned()
            .collect())
    }

    fn ahead_behind(&self, upstream: &str) -> anyhow::Result<AheadBehind> {
        let value = *self.ahead_behind.lock().unwrap();
        value.ok_or_else(|| {
            GitError::CommandFailed {
                command: format!("git rev-list --left-right --count HEAD...{upstream}"),
                output: "fatal: bad revision".to_string(),
            }
            .into()
        })
    }

    fn merge_ff_only(&self, upstream: &str) -> anyhow::Result<()> {
        self.record(format!("merge --ff-only {upstream}"));
        let mut ab = self.ahead_behind.lock().unwrap();
        if let Some(ab) = ab.as_mut() {
            ab.behind = 0;
        }
        Ok(())
    }

    fn rebase_onto(&self, upstream: &str) -> anyhow::Result<()> {
        self.record(format!("rebase {upstream}"));
        let mut ab = self.ahead_behind.lock().unwrap();
        if let Some(ab) = ab.as_mut() {
            ab.behind = 0;
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.record(format!("push {remote} {branch}"));
        let mut ab = self.ahead_behind.lock().unwrap();
        if let Some(ab) = ab.as_mut() {
            ab.ahead = 0;
        }
        Ok(())
    }

    fn read_blob(&self, rev: &str, path: &str) -> anyhow::Result<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(rev.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| GitError::NotFound(format!("{rev}:{path}")).into())
    }

    fn object_exists(&self, rev: &str, path: &str) -> anyhow::Result<bool> {
        let key = (rev.to_string(), path.to_string());
        Ok(self.objects.lock().unwrap().contains(&key) || self.blobs.lock().unwrap().contains_key(&key))
    }

    fn rev_parse(&self, rev: &str) -> anyhow::Result<String> {
        self.revs
            .lock()
            .unwrap()
            .get(rev)
            .cloned()
            .ok_or_else(|| GitError::NotFound(rev.to_string()).into())
    }

    fn fetch_marker_mtime(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(*self.fetch_marker.lock().unwrap())
    }

    fn ls_remote_head(&self, _remote: &str, _branch: &str) -> anyhow::Result<Option<String>> {
        Ok(self.remote_head.lock().unwrap().clone())
    }

    fn log_for_path(&self, _rev: Option<&str>, _path: &str, limit: usize) -> anyhow::Result<Vec<CommitSummary>> {
        Ok(self.log.lock().unwrap().iter().take(limit).cloned().collect())
    }
}
