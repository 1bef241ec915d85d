//! Last known tip of the remote branch, learned via `ls-remote`.
//!
//! `ls-remote` is cheap compared to a fetch, so it is polled in the
//! background while `partdb watch` runs. A fresh entry that disagrees with
//! the local `origin/<branch>` means the fetched data is out of date even
//! when `FETCH_HEAD` is recent.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::infra::git::GitFacade;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSha {
    pub sha: String,
    pub recorded_at: DateTime<Utc>,
}

impl CachedSha {
    /// Recorded no longer than `threshold` ago.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        now - self.recorded_at <= threshold
    }

    /// A fetch completed after this entry was recorded, so `origin/<branch>`
    /// is at least as recent.
    pub fn is_superseded_by(&self, fetched_at: DateTime<Utc>) -> bool {
        self.recorded_at < fetched_at
    }
}

/// Remote tips per repository, persisted so one-shot commands can use what
/// a running `watch` learned.
pub struct RemoteShaCache {
    dir: Option<PathBuf>,
    entries: Mutex<HashMap<PathBuf, CachedSha>>,
    pollers: Mutex<HashSet<PathBuf>>,
    stop: Arc<AtomicBool>,
}

impl RemoteShaCache {
    /// `dir` holds one JSON file per repository; `None` keeps entries in memory only.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            entries: Mutex::new(HashMap::new()),
            pollers: Mutex::new(HashSet::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn file_for(&self, repo: &Path) -> Option<PathBuf> {
        let digest = Sha256::digest(repo.to_string_lossy().as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.as_ref().map(|d| d.join(format!("{name}.json")))
    }

    pub fn record(&self, repo: &Path, sha: &str, at: DateTime<Utc>) {
        let entry = CachedSha {
            sha: sha.to_string(),
            recorded_at: at,
        };
        if let Some(path) = self.file_for(repo)
            && let Err(e) = persist(&path, &entry)
        {
            tracing::debug!(path = %path.display(), "failed to persist remote sha: {e:#}");
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.to_path_buf(), entry);
    }

    /// Latest entry for `repo`, from memory or disk.
    pub fn snapshot(&self, repo: &Path) -> Option<CachedSha> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(repo) {
            return Some(entry.clone());
        }
        let path = self.file_for(repo)?;
        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CachedSha = serde_json::from_str(&content)
            .inspect_err(|e| tracing::debug!(path = %path.display(), "ignoring remote sha cache: {e}"))
            .ok()?;
        entries.insert(repo.to_path_buf(), entry.clone());
        Some(entry)
    }

    /// Query the remote once and record the result.
    pub fn refresh<G: GitFacade + ?Sized>(
        &self,
        git: &G,
        remote: &str,
        branch: &str,
    ) -> anyhow::Result<Option<String>> {
        let sha = git.ls_remote_head(remote, branch)?;
        if let Some(sha) = &sha {
            self.record(git.repo_path(), sha, Utc::now());
        }
        Ok(sha)
    }

    /// Start polling `repo` in the background unless a poller already runs.
    pub fn ensure_started(
        self: &Arc<Self>,
        git: Arc<dyn GitFacade>,
        remote: &str,
        branch: &str,
    ) {
        let repo = git.repo_path().to_path_buf();
        if !self
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.clone())
        {
            return;
        }

        let cache = Arc::clone(self);
        let (remote, branch) = (remote.to_string(), branch.to_string());
        tracing::debug!(repo = %repo.display(), "starting remote sha poller");
        thread::spawn(move || {
            while !cache.stop.load(Ordering::SeqCst) {
                if let Err(e) = cache.refresh(git.as_ref(), &remote, &branch) {
                    tracing::debug!("ls-remote failed: {e:#}");
                }
                thread::sleep(POLL_INTERVAL);
            }
        });
    }

    /// Stop all pollers after their current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn persist(path: &Path, entry: &CachedSha) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent directory for {}", path.display()))?;
    std::fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(tmp.as_file(), entry)?;
    tmp.persist(path)?;
    Ok(())
}
