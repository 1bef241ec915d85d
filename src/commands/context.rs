//! Repository resolution shared by every command that touches the database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::infra::git::{GitCli, GitFacade};
use crate::library::{self, Category};
use crate::pending::{PendingStore, ReconciliationEngine};
use crate::shared::config::{self, Config};
use crate::shared::env_var::EnvVars;
use crate::shared::paths;
use crate::sync::passes::{self, PassSummary};
use crate::sync::{RemoteShaCache, RemoteSnapshotReader, SyncStatusEvaluator};

pub const REMOTE: &str = "origin";

/// An opened database repository with its collaborators.
pub struct RepoContext<G: GitFacade + ?Sized = GitCli> {
    pub root: PathBuf,
    pub config: Config,
    pub branch: String,
    pub git: Arc<G>,
    pub store: PendingStore,
    pub cache: Arc<RemoteShaCache>,
}

/// Pick the repository root: `--repo`, then `PARTDB_REPO`, then `repo_path`
/// from the config, then the nearest database above `cwd`.
pub fn resolve_root(
    flag: Option<&Path>,
    env: &EnvVars,
    config: &Config,
    cwd: &Path,
) -> anyhow::Result<PathBuf> {
    let explicit = flag
        .map(Path::to_path_buf)
        .or_else(|| env.repo.as_deref().map(PathBuf::from))
        .or_else(|| config.repo_path.clone());
    match explicit {
        Some(path) if library::is_repo_root(&path) => Ok(path),
        Some(path) => library::find_repo_root(&path),
        None => library::find_repo_root(cwd),
    }
}

impl RepoContext<GitCli> {
    pub fn open(flag: Option<&Path>) -> anyhow::Result<Self> {
        let env = EnvVars::load();
        let user_config = config::load_config()?;
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let root = resolve_root(flag, &env, &user_config, &cwd)?;
        let config = config::load_effective(user_config, &root)?;
        let git = GitCli::open(&root)?;
        let store = PendingStore::default_location()?;
        let cache = RemoteShaCache::new(paths::remote_sha_dir());
        tracing::debug!(root = %root.display(), "opened database repository");

        Ok(Self {
            branch: config.base_branch(),
            root,
            config,
            git: Arc::new(git),
            store,
            cache: Arc::new(cache),
        })
    }
}

impl<G: GitFacade + ?Sized> RepoContext<G> {
    pub fn categories(&self) -> anyhow::Result<Vec<Category>> {
        library::list_categories(&self.root)
    }

    /// All categories, or just `name` when given.
    pub fn select(&self, name: Option<&str>) -> anyhow::Result<Vec<Category>> {
        match name {
            Some(name) => Ok(vec![library::find_category(&self.root, name)?]),
            None => self.categories(),
        }
    }

    pub fn upstream(&self) -> String {
        format!("{REMOTE}/{}", self.branch)
    }

    /// Record `origin/<branch>` as the remote tip after a successful fetch or push.
    pub fn record_fetched_tip(&self, now: DateTime<Utc>) {
        let upstream = self.upstream();
        match self.git.rev_parse(&upstream) {
            Ok(sha) => self.cache.record(self.git.repo_path(), &sha, now),
            Err(e) => tracing::debug!("{upstream} unavailable: {e:#}"),
        }
    }

    /// Whether the working copy matches `origin/<branch>` with a clean tree.
    pub fn up_to_date(&self) -> anyhow::Result<bool> {
        let ab = self.git.ahead_behind(&self.upstream())?;
        Ok(ab.is_even() && self.git.status()?.is_empty())
    }

    pub fn engine(&self) -> ReconciliationEngine<'_> {
        ReconciliationEngine::new(&self.store)
    }

    pub fn reader(&self) -> RemoteSnapshotReader<'_, G> {
        RemoteSnapshotReader::new(
            self.git.as_ref(),
            &self.branch,
            self.config.stale_threshold(),
            Some(self.cache.as_ref()),
        )
    }

    /// Run the remote pass, then the local pass, over every category.
    pub fn reconcile_all(&self, now: DateTime<Utc>) -> anyhow::Result<PassSummary> {
        let categories = self.categories()?;
        let engine = self.engine();
        let remote = passes::remote_pass(&engine, &self.reader(), &categories, now);
        let local = passes::local_pass(&engine, &categories);
        Ok(PassSummary {
            applied: remote.applied,
            removed: remote.removed + local.removed,
        })
    }

    pub fn evaluator(&self) -> SyncStatusEvaluator<'_, G> {
        SyncStatusEvaluator::new(
            self.git.as_ref(),
            &self.store,
            &self.branch,
            self.config.stale_threshold(),
            Some(self.cache.as_ref()),
        )
    }
}
