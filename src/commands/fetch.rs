use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Args;

use super::context::{REMOTE, RepoContext};
use super::progress::spinner;
use crate::infra::git::GitFacade;
use crate::sync::passes::PassSummary;

#[derive(Args, Clone, PartialEq, Eq)]
pub struct FetchArgs {}

pub fn run(_args: &FetchArgs, repo: Option<&Path>) -> anyhow::Result<()> {
    let ctx = RepoContext::open(repo)?;
    let progress = spinner(&format!("Fetching {}...", ctx.upstream()));
    let summary = fetch(&ctx, Utc::now());
    progress.finish_and_clear();
    println!("{}", describe(&summary?));
    Ok(())
}

/// Fetch the base branch and reconcile against what arrived.
pub fn fetch<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    now: DateTime<Utc>,
) -> anyhow::Result<PassSummary> {
    ctx.git.fetch(REMOTE, &ctx.branch)?;
    tracing::info!(branch = %ctx.branch, "fetched");
    ctx.record_fetched_tip(now);
    ctx.reconcile_all(now)
}

pub fn describe(summary: &PassSummary) -> String {
    match (summary.applied, summary.removed) {
        (0, 0) => "Fetched.".to_string(),
        (applied, 0) => format!("Fetched. {applied} request(s) applied remotely."),
        (0, removed) => format!("Fetched. {removed} request(s) completed."),
        (applied, removed) => format!(
            "Fetched. {applied} request(s) applied remotely, {removed} completed."
        ),
    }
}
