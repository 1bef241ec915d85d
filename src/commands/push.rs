use std::path::Path;

use chrono::Utc;
use clap::Args;

use super::context::{REMOTE, RepoContext};
use super::progress::spinner;
use crate::infra::git::GitFacade;

#[derive(Args, Clone, PartialEq, Eq)]
pub struct PushArgs {}

pub fn run(_args: &PushArgs, repo: Option<&Path>) -> anyhow::Result<()> {
    let ctx = RepoContext::open(repo)?;
    let progress = spinner(&format!("Pushing to {}...", ctx.upstream()));
    let pushed = push(&ctx);
    progress.finish_and_clear();
    match pushed? {
        0 => println!("Nothing to push."),
        n => println!("Pushed {n} commit(s) to {}.", ctx.upstream()),
    }
    Ok(())
}

/// Push local commits on the base branch. Returns how many were ahead.
pub fn push<G: GitFacade + ?Sized>(ctx: &RepoContext<G>) -> anyhow::Result<u32> {
    let ahead = ctx.git.ahead_behind(&ctx.upstream())?.ahead;
    if ahead == 0 {
        return Ok(0);
    }
    ctx.git.push(REMOTE, &ctx.branch)?;
    tracing::info!(ahead, branch = %ctx.branch, "pushed");
    ctx.record_fetched_tip(Utc::now());
    Ok(ahead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::test_support::fixture;

    #[test]
    fn push_skips_when_nothing_ahead() {
        let f = fixture("IPN\n");
        assert_eq!(push(&f.ctx).unwrap(), 0);
        assert!(f.ctx.git.calls().is_empty());
    }

    #[test]
    fn push_sends_local_commits() {
        let f = fixture("IPN\n");
        f.ctx.git.set_ahead_behind(2, 0);

        assert_eq!(push(&f.ctx).unwrap(), 2);
        assert_eq!(f.ctx.git.calls(), vec!["push origin main".to_string()]);
    }
}
