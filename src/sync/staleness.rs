use chrono::{DateTime, Utc};

use super::remote_sha::CachedSha;
use crate::infra::git::GitFacade;

/// Whether fetched remote data can be trusted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub stale: bool,
    /// Time since the last fetch, if the repository was ever fetched.
    pub age: Option<chrono::Duration>,
}

/// Decide staleness from the fetch marker age and the cached remote tip.
///
/// A cached tip recorded within `threshold` and not before the last fetch is
/// authoritative: it must match the local `origin/<branch>`. Without one, the
/// fetch marker must be younger than `threshold`.
pub fn check<G: GitFacade + ?Sized>(
    git: &G,
    branch: &str,
    threshold: chrono::Duration,
    cached: Option<&CachedSha>,
    now: DateTime<Utc>,
) -> anyhow::Result<Freshness> {
    let fetched_at = git.fetch_marker_mtime()?;
    let age = fetched_at.map(|mtime| (now - mtime).max(chrono::Duration::zero()));

    let authoritative = cached
        .filter(|c| c.is_fresh(now, threshold))
        .filter(|c| fetched_at.is_none_or(|mtime| !c.is_superseded_by(mtime)));
    if let Some(cached) = authoritative {
        let local = git
            .rev_parse(&format!("origin/{branch}"))
            .inspect_err(|e| tracing::debug!("origin/{branch} unavailable: {e:#}"))
            .ok();
        let agrees = local.as_deref() == Some(cached.sha.as_str());
        return Ok(Freshness { stale: !agrees, age });
    }

    let stale = age.is_none_or(|age| age > threshold);
    Ok(Freshness { stale, age })
}
