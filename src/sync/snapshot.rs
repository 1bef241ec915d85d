use chrono::{DateTime, Utc};

use super::remote_sha::RemoteShaCache;
use super::staleness;
use crate::infra::git::GitFacade;
use crate::library::{Category, RowMap, table};
use crate::pending::RemoteObservation;

/// Category rows on `origin/<branch>` as of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    pub rows: RowMap,
    pub fetch_mtime: DateTime<Utc>,
}

impl RemoteSnapshot {
    pub fn observation(&self) -> RemoteObservation<'_> {
        RemoteObservation {
            rows: &self.rows,
            fetch_mtime: self.fetch_mtime,
        }
    }
}

/// Reads category tables from the remote-tracking branch without touching
/// the network.
pub struct RemoteSnapshotReader<'a, G: GitFacade + ?Sized> {
    git: &'a G,
    branch: &'a str,
    threshold: chrono::Duration,
    cache: Option<&'a RemoteShaCache>,
}

impl<'a, G: GitFacade + ?Sized> RemoteSnapshotReader<'a, G> {
    pub fn new(
        git: &'a G,
        branch: &'a str,
        threshold: chrono::Duration,
        cache: Option<&'a RemoteShaCache>,
    ) -> Self {
        Self {
            git,
            branch,
            threshold,
            cache,
        }
    }

    /// Rows of `category` on `origin/<branch>`, or `None` if the last fetch is
    /// stale or the table cannot be read.
    pub fn read(&self, category: &Category, now: DateTime<Utc>) -> Option<RemoteSnapshot> {
        match self.try_read(category, now) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(category = %category.name, "failed to read remote table: {e:#}");
                None
            }
        }
    }

    fn try_read(&self, category: &Category, now: DateTime<Utc>) -> anyhow::Result<Option<RemoteSnapshot>> {
        let cached = self
            .cache
            .and_then(|c| c.snapshot(self.git.repo_path()));
        let freshness = staleness::check(self.git, self.branch, self.threshold, cached.as_ref(), now)?;
        if freshness.stale {
            tracing::debug!(category = %category.name, "remote data stale, skipping");
            return Ok(None);
        }
        let Some(fetch_mtime) = self.git.fetch_marker_mtime()? else {
            return Ok(None);
        };

        let text = self
            .git
            .read_blob(&format!("origin/{}", self.branch), &category.repo_relative_path())?;
        let rows = table::parse_table(&text)?.by_ipn();
        Ok(Some(RemoteSnapshot { rows, fetch_mtime }))
    }
}
