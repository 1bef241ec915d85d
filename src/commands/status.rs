use std::io::IsTerminal;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Args;

use super::context::{REMOTE, RepoContext};
use crate::infra::git::GitFacade;
use crate::library;
use crate::sync::{Scope, StatusColor, SyncReport};

#[derive(Args, Clone, PartialEq, Eq)]
pub struct StatusArgs {
    /// Category to report on (default: the whole database)
    pub category: Option<String>,

    /// Ask the remote for its current head before evaluating
    #[arg(long)]
    pub check_remote: bool,
}

pub fn run(args: &StatusArgs, repo: Option<&Path>) -> anyhow::Result<()> {
    let ctx = RepoContext::open(repo)?;
    if args.check_remote
        && let Err(e) = ctx.cache.refresh(ctx.git.as_ref(), REMOTE, &ctx.branch)
    {
        tracing::warn!("could not query remote head: {e:#}");
    }
    let report = evaluate(&ctx, args.category.as_deref(), Utc::now())?;
    println!("{}", format_report(&report, std::io::stdout().is_terminal()));
    Ok(())
}

/// Reconcile pending requests, then evaluate `category` or the whole database.
pub fn evaluate<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    category: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<SyncReport> {
    ctx.reconcile_all(now)?;
    let evaluator = ctx.evaluator();
    Ok(match category {
        Some(name) => {
            let category = library::find_category(&ctx.root, name)?;
            evaluator.evaluate(Scope::Category(&category), now)
        }
        None => evaluator.evaluate(Scope::Global, now),
    })
}

fn ansi(color: StatusColor) -> &'static str {
    match color {
        StatusColor::Gray => "\x1b[90m",
        StatusColor::Green => "\x1b[32m",
        StatusColor::Yellow => "\x1b[33m",
        StatusColor::Red => "\x1b[31m",
        StatusColor::Blue => "\x1b[34m",
    }
}

pub fn paint(color: StatusColor, text: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{text}\x1b[0m", ansi(color))
    } else {
        text.to_string()
    }
}

pub fn format_report(report: &SyncReport, use_color: bool) -> String {
    let mut out = paint(report.status.color(), &format!("● {}", report.status), use_color);
    if report.pending > 0 {
        let plural = if report.pending == 1 { "" } else { "s" };
        out.push_str(&format!("\n  {} pending request{plural}", report.pending));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::test_support::fixture;
    use crate::pending::model::PendingState;
    use crate::sync::status::SyncStatus;
    use crate::testing::factories::{at, pending_delete};

    const NOW: i64 = 10_000;

    #[test]
    fn evaluate_drops_request_already_applied_locally() {
        let f = fixture("IPN,Value\nR0002,1k\n");
        f.ctx.git.set_fetch_marker(Some(at(NOW - 5)));
        f.ctx.store.add("Resistors", pending_delete("Resistors", "R0001")).unwrap();

        let report = evaluate(&f.ctx, None, at(NOW)).unwrap();

        assert_eq!(report.status, SyncStatus::Synchronized);
        assert!(f.ctx.store.is_empty());
    }

    #[test]
    fn evaluate_sees_remote_application() {
        let f = fixture("IPN,Value\nR0001,10k\nR0002,1k\n");
        f.ctx.git.set_fetch_marker(Some(at(NOW - 5)));
        f.ctx.git.set_ahead_behind(0, 1);
        f.ctx.git.set_blob("origin/main", "Database/db-Resistors.csv", "IPN,Value\nR0002,1k\n");
        f.ctx.store.add("Resistors", pending_delete("Resistors", "R0001")).unwrap();

        let report = evaluate(&f.ctx, Some("Resistors"), at(NOW)).unwrap();

        assert_eq!(report.status, SyncStatus::SyncNeeded);
        assert_eq!(f.ctx.store.list_for("Resistors")[0].state, PendingState::AppliedRemote);
    }

    #[test]
    fn evaluate_rejects_unknown_category() {
        let f = fixture("IPN\n");
        assert!(evaluate(&f.ctx, Some("Capacitors"), at(NOW)).is_err());
    }

    #[test]
    fn format_report_lists_pending_count() {
        let report = SyncReport {
            status: SyncStatus::PendingChanges,
            ahead_behind: None,
            dirty: false,
            pending: 2,
        };
        assert_eq!(format_report(&report, false), "● Pending changes\n  2 pending requests");
    }

    #[test]
    fn format_report_colors_when_asked() {
        let report = SyncReport {
            status: SyncStatus::Synchronized,
            ahead_behind: None,
            dirty: false,
            pending: 0,
        };
        assert_eq!(format_report(&report, true), "\x1b[32m● Synchronized\x1b[0m");
    }
}
