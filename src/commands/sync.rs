use std::io::IsTerminal;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Args;

use super::context::{REMOTE, RepoContext};
use super::progress::spinner;
use super::status::format_report;
use crate::infra::git::GitFacade;
use crate::sync::{Scope, SyncReport};

#[derive(Args, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// Rebase local commits instead of requiring a fast-forward
    #[arg(long)]
    pub rebase: bool,

    /// Skip fetching; integrate the already fetched branch
    #[arg(long)]
    pub no_fetch: bool,
}

pub fn run(args: &SyncArgs, repo: Option<&Path>) -> anyhow::Result<()> {
    let ctx = RepoContext::open(repo)?;
    let progress = spinner(&format!("Syncing with {}...", ctx.upstream()));
    let report = sync(&ctx, args, Utc::now());
    progress.finish_and_clear();
    println!("{}", format_report(&report?, std::io::stdout().is_terminal()));
    Ok(())
}

/// Bring the working copy up to date with the base branch, then retire the
/// requests that arrived with it.
pub fn sync<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    args: &SyncArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<SyncReport> {
    if !args.no_fetch {
        ctx.git.fetch(REMOTE, &ctx.branch)?;
        ctx.record_fetched_tip(now);
    }
    ctx.reconcile_all(now)?;

    let upstream = ctx.upstream();
    if args.rebase {
        ctx.git.rebase_onto(&upstream)?;
    } else {
        ctx.git.merge_ff_only(&upstream)?;
    }
    tracing::info!(%upstream, rebase = args.rebase, "working copy updated");

    ctx.reconcile_all(now)?;
    if ctx.up_to_date()? {
        let engine = ctx.engine();
        for category in ctx.store.items_by_category().into_keys() {
            engine.drop_applied_if_synced(&category, ctx.git.as_ref())?;
        }
    }
    Ok(ctx.evaluator().evaluate(Scope::Global, now))
}
