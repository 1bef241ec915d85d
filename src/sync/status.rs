//! Sync status of the working copy against the remote branch, including
//! pending requests.

use std::fmt;

use chrono::{DateTime, Utc};

use super::remote_sha::RemoteShaCache;
use super::staleness;
use crate::infra::git::{AheadBehind, GitFacade};
use crate::library::Category;
use crate::pending::{PendingRequest, PendingStore, ReconciliationEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Gray,
    Green,
    Yellow,
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Remote data is too old to compare against.
    Stale { age: Option<chrono::Duration> },
    Synchronized,
    /// Uncommitted changes in the working copy.
    LocalChanges,
    OutOfDate { ahead: u32, behind: u32 },
    /// Requests submitted and not yet visible locally.
    PendingChanges,
    /// A request was applied remotely; pulling will bring it in.
    SyncNeeded,
}

impl SyncStatus {
    pub fn color(&self) -> StatusColor {
        match self {
            Self::Stale { .. } => StatusColor::Gray,
            Self::Synchronized => StatusColor::Green,
            Self::LocalChanges | Self::PendingChanges => StatusColor::Yellow,
            Self::OutOfDate { .. } => StatusColor::Red,
            Self::SyncNeeded => StatusColor::Blue,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Stale { age: Some(age) } => {
                format!("Remote status unknown (last fetch {} ago)", format_age(*age))
            }
            Self::Stale { age: None } => "Remote status unknown (never fetched)".to_string(),
            Self::Synchronized => "Synchronized".to_string(),
            Self::LocalChanges => "Local changes".to_string(),
            Self::OutOfDate { ahead, behind } => {
                format!("Out of date ({ahead} ahead, {behind} behind)")
            }
            Self::PendingChanges => "Pending changes".to_string(),
            Self::SyncNeeded => "Sync needed".to_string(),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs / 60),
        3600..86400 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Global,
    Category(&'a Category),
}

/// Evaluated status plus the raw signals behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub ahead_behind: Option<AheadBehind>,
    pub dirty: bool,
    pub pending: usize,
}

impl SyncReport {
    fn stale(age: Option<chrono::Duration>) -> Self {
        Self {
            status: SyncStatus::Stale { age },
            ahead_behind: None,
            dirty: false,
            pending: 0,
        }
    }
}

pub struct SyncStatusEvaluator<'a, G: GitFacade + ?Sized> {
    git: &'a G,
    store: &'a PendingStore,
    branch: &'a str,
    threshold: chrono::Duration,
    cache: Option<&'a RemoteShaCache>,
}

impl<'a, G: GitFacade + ?Sized> SyncStatusEvaluator<'a, G> {
    pub fn new(
        git: &'a G,
        store: &'a PendingStore,
        branch: &'a str,
        threshold: chrono::Duration,
        cache: Option<&'a RemoteShaCache>,
    ) -> Self {
        Self {
            git,
            store,
            branch,
            threshold,
            cache,
        }
    }

    /// Evaluate `scope`. Git failures degrade to [`SyncStatus::Stale`] with the
    /// last fetch age, when that is still known.
    pub fn evaluate(&self, scope: Scope<'_>, now: DateTime<Utc>) -> SyncReport {
        match self.try_evaluate(scope, now) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("sync status unavailable: {e:#}");
                SyncReport::stale(self.git.fetch_marker_age(now).ok().flatten())
            }
        }
    }

    fn try_evaluate(&self, scope: Scope<'_>, now: DateTime<Utc>) -> anyhow::Result<SyncReport> {
        let cached = self.cache.and_then(|c| c.snapshot(self.git.repo_path()));
        let freshness = staleness::check(self.git, self.branch, self.threshold, cached.as_ref(), now)?;
        if freshness.stale {
            return Ok(SyncReport::stale(freshness.age));
        }

        let upstream = format!("origin/{}", self.branch);
        let ab = self.git.ahead_behind(&upstream)?;
        let status = self.git.status()?;
        let dirty = match scope {
            Scope::Global => !status.is_empty(),
            Scope::Category(category) => {
                let csv = category.repo_relative_path();
                status.iter().any(|entry| entry.path == csv)
            }
        };

        let base = if ab.is_even() && !dirty {
            SyncStatus::Synchronized
        } else if dirty {
            SyncStatus::LocalChanges
        } else {
            match scope {
                Scope::Global => SyncStatus::OutOfDate {
                    ahead: ab.ahead,
                    behind: ab.behind,
                },
                Scope::Category(category) => {
                    let csv = category.repo_relative_path();
                    let changed = self.git.diff_name_status("HEAD", &upstream, &[csv.as_str()])?;
                    if changed.is_empty() {
                        SyncStatus::Synchronized
                    } else {
                        SyncStatus::OutOfDate {
                            ahead: ab.ahead,
                            behind: ab.behind,
                        }
                    }
                }
            }
        };

        let categories: Vec<String> = match scope {
            Scope::Global => self.store.items_by_category().into_keys().collect(),
            Scope::Category(category) => vec![category.name.clone()],
        };
        let up_to_date = ab.is_even() && status.is_empty();
        if up_to_date {
            let engine = ReconciliationEngine::new(self.store);
            for category in &categories {
                if let Err(e) = engine.drop_applied_if_synced(category, self.git) {
                    tracing::warn!(category, "failed to drop synced requests: {e:#}");
                }
            }
        }

        let items: Vec<PendingRequest> = categories
            .iter()
            .flat_map(|c| self.store.list_for(c))
            .collect();
        let status = if ab.behind > 0 && items.iter().any(PendingRequest::is_applied_remote) {
            SyncStatus::SyncNeeded
        } else if !items.is_empty() {
            SyncStatus::PendingChanges
        } else {
            base
        };

        Ok(SyncReport {
            status,
            ahead_behind: Some(ab),
            dirty,
            pending: items.len(),
        })
    }
}
