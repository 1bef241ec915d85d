use std::path::Path;

use clap::Args;

use super::context::RepoContext;
use crate::infra::git::{CommitSummary, GitFacade};
use crate::library;

#[derive(Args, Clone, PartialEq, Eq)]
pub struct HistoryArgs {
    /// Category whose table history to show
    pub category: String,

    /// Maximum number of commits
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Show the fetched remote branch instead of HEAD
    #[arg(long)]
    pub remote: bool,
}

pub fn run(args: &HistoryArgs, repo: Option<&Path>) -> anyhow::Result<()> {
    let ctx = RepoContext::open(repo)?;
    print!("{}", format_history(&history(&ctx, args)?));
    Ok(())
}

pub fn history<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    args: &HistoryArgs,
) -> anyhow::Result<Vec<CommitSummary>> {
    let category = library::find_category(&ctx.root, &args.category)?;
    let upstream = ctx.upstream();
    let rev = args.remote.then_some(upstream.as_str());
    ctx.git
        .log_for_path(rev, &category.repo_relative_path(), args.limit)
}

fn format_history(commits: &[CommitSummary]) -> String {
    commits
        .iter()
        .map(|c| {
            let short = c.sha.get(..8).unwrap_or(&c.sha);
            format!("{short} {} {:<16} {}\n", c.date, c.author, c.subject)
        })
        .collect()
}
