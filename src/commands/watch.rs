//! Foreground loop that keeps pending requests and sync status current.
//!
//! A tick thread and a file watcher on `Database/` feed one channel. Every
//! git operation runs on worker threads through [`TaskRunner`] and reports
//! back on the same channel, so the driving thread never waits on git or the
//! network. At most one refresh (reconciliation plus status) runs at a time.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use notify::{
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{CreateKind, ModifyKind, RemoveKind},
};

use super::context::{REMOTE, RepoContext};
use super::status::format_report;
use crate::infra::git::GitFacade;
use crate::library::{self, Category};
use crate::sync::passes::{self, PassSummary};
use crate::sync::{FetchTrigger, LocalChangeTracker, Scope};
use crate::tasks::TaskRunner;

const TICK: Duration = Duration::from_secs(1);
/// Shortest gap between fetches started because the remote tip moved.
const MIN_FETCH_GAP: Duration = Duration::from_secs(5);

#[derive(Args, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    /// Exit after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Seconds between fetches (default: sync.fetch_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub enum WatchEvent {
    Tick,
    /// Category tables changed on disk.
    TablesChanged(Vec<String>),
    /// A background fetch finished.
    Fetched(std::result::Result<(), String>),
    /// A background refresh finished.
    Refreshed(RefreshOutcome),
}

#[derive(Debug, Default, PartialEq)]
pub struct RefreshOutcome {
    /// New status line, if it changed.
    status_line: Option<String>,
    /// The polled remote tip differs from `origin/<branch>`.
    remote_moved: bool,
}

struct EventHandler {
    receiver: Receiver<WatchEvent>,
    /// Watcher must be kept alive to receive events.
    watcher: Option<RecommendedWatcher>,
}

impl EventHandler {
    fn new(tx: Sender<WatchEvent>, receiver: Receiver<WatchEvent>, db_dir: &Path) -> Self {
        let tick_tx = tx.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(TICK);
                if tick_tx.send(WatchEvent::Tick).is_err() {
                    break;
                }
            }
        });

        let watcher = setup_table_watcher(tx, db_dir)
            .inspect_err(|e| tracing::warn!("file watcher unavailable, polling instead: {e:#}"))
            .ok();
        Self { receiver, watcher }
    }

    fn next(&self) -> Result<WatchEvent> {
        self.receiver
            .recv()
            .map_err(|e| anyhow::anyhow!("Event channel closed: {}", e))
    }
}

fn setup_table_watcher(tx: Sender<WatchEvent>, db_dir: &Path) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let changed = extract_table_changes(&event);
            if !changed.is_empty() {
                let _ = tx.send(WatchEvent::TablesChanged(changed));
            }
        }
    })?;
    watcher.watch(db_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Category names of the tables an event touched.
fn extract_table_changes(event: &notify::Event) -> Vec<String> {
    match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any)
        | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
        | EventKind::Remove(RemoveKind::File | RemoveKind::Any) => {}
        _ => return Vec::new(),
    }

    let mut names: Vec<String> = event
        .paths
        .iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            library::category_name(file_name).map(str::to_string)
        })
        .collect();
    names.dedup();
    names
}

/// Reconciliation state carried across refreshes. Only touched by the one
/// refresh job in flight.
struct WatchState<G: GitFacade + ?Sized> {
    ctx: Arc<RepoContext<G>>,
    fetch_trigger: FetchTrigger,
    last_status: Option<String>,
    /// Mtime polling, when no file watcher is available.
    tracker: Option<LocalChangeTracker>,
}

impl<G: GitFacade + ?Sized> WatchState<G> {
    fn new(ctx: Arc<RepoContext<G>>, poll_tables: bool) -> Self {
        let marker = ctx.git.fetch_marker_mtime().ok().flatten();
        let mut state = Self {
            ctx,
            fetch_trigger: FetchTrigger::new(marker),
            last_status: None,
            tracker: None,
        };
        if poll_tables {
            state.tracker = Some(LocalChangeTracker::new(&state.categories()));
        }
        state
    }

    fn categories(&self) -> Vec<Category> {
        self.ctx
            .categories()
            .inspect_err(|e| tracing::warn!("failed to list categories: {e:#}"))
            .unwrap_or_default()
    }

    /// Remote pass, if `FETCH_HEAD` advanced since the last one.
    fn on_fetch_marker(&mut self, now: DateTime<Utc>) -> PassSummary {
        let marker = self.ctx.git.fetch_marker_mtime().ok().flatten();
        if !self.fetch_trigger.advanced(marker) {
            return PassSummary::default();
        }
        passes::remote_pass(&self.ctx.engine(), &self.ctx.reader(), &self.categories(), now)
    }

    /// Local pass over the named categories.
    fn on_tables_changed(&mut self, names: &[String]) -> PassSummary {
        let affected: Vec<Category> = self
            .categories()
            .into_iter()
            .filter(|c| names.contains(&c.name))
            .collect();
        passes::local_pass(&self.ctx.engine(), &affected)
    }

    /// The status line, when it differs from the last one returned.
    fn status_update(&mut self, now: DateTime<Utc>) -> Option<String> {
        let report = self.ctx.evaluator().evaluate(Scope::Global, now);
        let line = format_report(&report, false).replace('\n', ";");
        if self.last_status.as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last_status = Some(line.clone());
        Some(line)
    }

    /// Whether a polled remote tip, newer than the last fetch, disagrees with
    /// `origin/<branch>`.
    fn remote_moved(&self, now: DateTime<Utc>) -> bool {
        let Some(cached) = self.ctx.cache.snapshot(self.ctx.git.repo_path()) else {
            return false;
        };
        if !cached.is_fresh(now, self.ctx.config.stale_threshold()) {
            return false;
        }
        let fetched_at = self.ctx.git.fetch_marker_mtime().ok().flatten();
        if fetched_at.is_some_and(|at| cached.is_superseded_by(at)) {
            return false;
        }
        self.ctx
            .git
            .rev_parse(&self.ctx.upstream())
            .ok()
            .is_none_or(|local| local != cached.sha)
    }

    fn refresh(&mut self, changed: &[String], now: DateTime<Utc>) -> RefreshOutcome {
        let summary = self.on_fetch_marker(now);
        if summary.changed() {
            tracing::debug!(applied = summary.applied, removed = summary.removed, "remote pass");
        }

        let mut changed = changed.to_vec();
        if let Some(mut tracker) = self.tracker.take() {
            changed.extend(tracker.changed(&self.categories()));
            self.tracker = Some(tracker);
        }
        changed.sort();
        changed.dedup();
        if !changed.is_empty() {
            let summary = self.on_tables_changed(&changed);
            tracing::debug!(names = ?changed, removed = summary.removed, "local pass");
        }

        RefreshOutcome {
            status_line: self.status_update(now),
            remote_moved: self.remote_moved(now),
        }
    }
}

/// Which background jobs to start next.
#[derive(Debug, Default, PartialEq)]
struct Jobs {
    /// Start a refresh covering these changed tables.
    refresh: Option<Vec<String>>,
    fetch: bool,
}

/// Decides when refreshes and fetches start. Keeps one of each in flight at
/// most, so a slow fetch never holds back refreshes.
struct Scheduler {
    interval: Duration,
    refreshing: bool,
    fetching: bool,
    refresh_wanted: bool,
    fetch_wanted: bool,
    changed_tables: Vec<String>,
    last_fetch: Option<Instant>,
}

impl Scheduler {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            refreshing: false,
            fetching: false,
            refresh_wanted: true,
            fetch_wanted: false,
            changed_tables: Vec::new(),
            last_fetch: None,
        }
    }

    /// Apply a finished job or an external signal. Returns a status line to print.
    fn on_event(&mut self, event: WatchEvent) -> Option<String> {
        match event {
            WatchEvent::Tick => self.refresh_wanted = true,
            WatchEvent::TablesChanged(names) => {
                self.changed_tables.extend(names);
                self.refresh_wanted = true;
            }
            WatchEvent::Fetched(result) => {
                self.fetching = false;
                self.refresh_wanted = true;
                if let Err(e) = result {
                    tracing::warn!("background fetch failed: {e}");
                }
            }
            WatchEvent::Refreshed(outcome) => {
                self.refreshing = false;
                if outcome.remote_moved {
                    tracing::debug!("remote tip moved, fetching");
                    self.fetch_wanted = true;
                }
                return outcome.status_line;
            }
        }
        None
    }

    fn next_jobs(&mut self, now: Instant) -> Jobs {
        let mut jobs = Jobs::default();
        if self.refresh_wanted && !self.refreshing {
            self.refresh_wanted = false;
            self.refreshing = true;
            jobs.refresh = Some(std::mem::take(&mut self.changed_tables));
        }

        let since_last = |gap: Duration| self.last_fetch.is_none_or(|t| now.duration_since(t) >= gap);
        let due = since_last(self.interval) || (self.fetch_wanted && since_last(MIN_FETCH_GAP));
        if due && !self.fetching {
            self.fetch_wanted = false;
            self.fetching = true;
            self.last_fetch = Some(now);
            jobs.fetch = true;
        }
        jobs
    }
}

pub fn run(args: &WatchArgs, repo: Option<&Path>) -> Result<()> {
    let ctx = Arc::new(RepoContext::open(repo)?);
    let interval = args
        .interval
        .map(|s| Duration::from_secs(s.max(1)))
        .unwrap_or_else(|| ctx.config.fetch_interval());
    let deadline = args.duration.map(|s| Instant::now() + Duration::from_secs(s));

    let (tx, rx) = mpsc::channel();
    let runner = TaskRunner::new(tx.clone());
    let events = EventHandler::new(tx, rx, &ctx.root.join("Database"));
    ctx.cache.ensure_started(ctx.git.clone(), REMOTE, &ctx.branch);

    let state = Arc::new(Mutex::new(WatchState::new(
        Arc::clone(&ctx),
        events.watcher.is_none(),
    )));
    let mut scheduler = Scheduler::new(interval);
    tracing::info!(interval = ?interval, "watching {}", ctx.root.display());

    loop {
        let jobs = scheduler.next_jobs(Instant::now());
        if let Some(changed) = jobs.refresh {
            let state = Arc::clone(&state);
            runner.run(
                move || {
                    state
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .refresh(&changed, Utc::now())
                },
                WatchEvent::Refreshed,
            );
        }
        if jobs.fetch {
            let ctx = Arc::clone(&ctx);
            runner.run(
                move || {
                    ctx.git
                        .fetch(REMOTE, &ctx.branch)
                        .map(|()| ctx.record_fetched_tip(Utc::now()))
                        .map_err(|e| format!("{e:#}"))
                },
                WatchEvent::Fetched,
            );
        }

        let Some(event) = runner.accept(events.next()?) else {
            break;
        };
        if matches!(event, WatchEvent::Tick) && deadline.is_some_and(|d| Instant::now() >= d) {
            runner.close();
            break;
        }
        if let Some(line) = scheduler.on_event(event) {
            println!("{} {line}", chrono::Local::now().format("%H:%M:%S"));
        }
    }

    ctx.cache.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::test_support::{Fixture, fixture};
    use crate::testing::factories::{at, pending_delete};
    use crate::testing::fake_git::FakeGit;
    use notify::event::DataChange;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn shared(table: &str) -> (TempDir, Arc<RepoContext<FakeGit>>) {
        let Fixture { dir, ctx } = fixture(table);
        (dir, Arc::new(ctx))
    }

    #[test]
    fn extract_table_changes_from_csv_write() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/repo/Database/db-Resistors.csv"],
        );
        assert_eq!(extract_table_changes(&e), vec!["Resistors".to_string()]);
    }

    #[test]
    fn extract_table_changes_ignores_other_files() {
        let e = event(
            EventKind::Create(CreateKind::File),
            &["/repo/Database/partdb.yaml", "/repo/Database/.db-Resistors.csv.swp"],
        );
        assert!(extract_table_changes(&e).is_empty());
    }

    #[test]
    fn extract_table_changes_ignores_access_events() {
        let e = event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/repo/Database/db-Resistors.csv"],
        );
        assert!(extract_table_changes(&e).is_empty());
    }

    #[test]
    fn remote_pass_runs_only_when_fetch_marker_advances() {
        let (_f, ctx) = shared("IPN,Value\nR0001,10k\n");
        ctx.git.set_fetch_marker(Some(at(100)));
        ctx.git.set_blob("origin/main", "Database/db-Resistors.csv", "IPN,Value\n");
        ctx.store.add("Resistors", pending_delete("Resistors", "R0001")).unwrap();
        let mut state = WatchState::new(Arc::clone(&ctx), false);

        assert_eq!(state.on_fetch_marker(at(110)), PassSummary::default());

        ctx.git.set_fetch_marker(Some(at(105)));
        assert_eq!(state.on_fetch_marker(at(110)).applied, 1);
        assert!(ctx.store.list_for("Resistors")[0].is_applied_remote());
    }

    #[test]
    fn table_change_runs_local_pass_for_that_category() {
        let (_f, ctx) = shared("IPN,Value\nR0002,1k\n");
        ctx.store.add("Resistors", pending_delete("Resistors", "R0001")).unwrap();
        let mut state = WatchState::new(Arc::clone(&ctx), false);

        assert_eq!(state.on_tables_changed(&["Capacitors".to_string()]).removed, 0);
        assert_eq!(state.on_tables_changed(&["Resistors".to_string()]).removed, 1);
        assert!(ctx.store.is_empty());
    }

    #[test]
    fn refresh_reports_only_status_changes() {
        let (_f, ctx) = shared("IPN\n");
        ctx.git.set_fetch_marker(Some(at(100)));
        let mut state = WatchState::new(Arc::clone(&ctx), false);

        assert_eq!(
            state.refresh(&[], at(110)).status_line.as_deref(),
            Some("● Synchronized")
        );
        assert_eq!(state.refresh(&[], at(111)).status_line, None);

        ctx.git.set_ahead_behind(0, 2);
        assert_eq!(
            state.refresh(&[], at(112)).status_line.as_deref(),
            Some("● Out of date (0 ahead, 2 behind)")
        );
    }

    #[test]
    fn refresh_detects_polled_remote_tip_ahead_of_origin() {
        let (_f, ctx) = shared("IPN\n");
        ctx.git.set_fetch_marker(Some(at(100)));
        ctx.git.set_rev("origin/main", "oldsha");
        let mut state = WatchState::new(Arc::clone(&ctx), false);

        ctx.cache.record(ctx.git.repo_path(), "oldsha", at(105));
        assert!(!state.refresh(&[], at(110)).remote_moved);

        ctx.cache.record(ctx.git.repo_path(), "newsha", at(106));
        assert!(state.refresh(&[], at(110)).remote_moved);

        ctx.git.set_fetch_marker(Some(at(108)));
        assert!(!state.refresh(&[], at(110)).remote_moved);
    }

    #[test]
    fn scheduler_fetch_in_flight_does_not_hold_back_refreshes() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(Duration::from_secs(60));

        assert_eq!(
            scheduler.next_jobs(start),
            Jobs {
                refresh: Some(Vec::new()),
                fetch: true
            }
        );
        scheduler.on_event(WatchEvent::Refreshed(RefreshOutcome::default()));
        scheduler.on_event(WatchEvent::TablesChanged(vec!["Resistors".to_string()]));

        let jobs = scheduler.next_jobs(start + Duration::from_secs(1));
        assert_eq!(jobs.refresh, Some(vec!["Resistors".to_string()]));
        assert!(!jobs.fetch);
    }

    #[test]
    fn scheduler_runs_one_refresh_at_a_time() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(Duration::from_secs(60));
        scheduler.next_jobs(start);

        scheduler.on_event(WatchEvent::Tick);
        assert_eq!(scheduler.next_jobs(start).refresh, None);

        let line = scheduler.on_event(WatchEvent::Refreshed(RefreshOutcome {
            status_line: Some("● Synchronized".to_string()),
            remote_moved: false,
        }));
        assert_eq!(line.as_deref(), Some("● Synchronized"));
        assert_eq!(scheduler.next_jobs(start).refresh, Some(Vec::new()));
    }

    #[test]
    fn scheduler_fetches_when_remote_tip_moves() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(Duration::from_secs(60));
        scheduler.next_jobs(start);
        scheduler.on_event(WatchEvent::Fetched(Ok(())));
        scheduler.on_event(WatchEvent::Refreshed(RefreshOutcome {
            status_line: None,
            remote_moved: true,
        }));

        assert!(!scheduler.next_jobs(start + Duration::from_secs(2)).fetch);
        assert!(scheduler.next_jobs(start + MIN_FETCH_GAP).fetch);
    }

    #[test]
    fn scheduler_fetches_on_interval() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(Duration::from_secs(30));
        scheduler.next_jobs(start);
        scheduler.on_event(WatchEvent::Fetched(Err("offline".to_string())));

        assert!(!scheduler.next_jobs(start + Duration::from_secs(29)).fetch);
        assert!(scheduler.next_jobs(start + Duration::from_secs(30)).fetch);
    }
}
