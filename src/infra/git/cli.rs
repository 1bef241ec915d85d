//! [`GitFacade`] backed by the `git` executable and libgit2.
//!
//! Commands that touch refs or the network shell out to `git` so that the
//! user's credential helpers and hooks apply. Object lookups go through git2.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use git2::{ErrorCode, Repository};

use super::error::{GitError, Result};
use super::facade::{AheadBehind, CommitSummary, GitFacade, StatusEntry};
use super::parse;

/// Serializes every git invocation in the process.
static GIT_LOCK: Mutex<()> = Mutex::new(());

const REF_LOCK_RETRY_DELAY: Duration = Duration::from_millis(250);
const LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn git_lock() -> MutexGuard<'static, ()> {
    GIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    /// Open the working copy at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)
            .map_err(|_| GitError::NotInRepo(path.display().to_string()))?;
        let repo_path = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::NotInRepo(path.display().to_string()))?;
        Ok(Self { repo_path })
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        cmd
    }

    fn describe(args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }

    fn check(args: &[&str], output: Output) -> Result<String> {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(GitError::CommandFailed {
            command: Self::describe(args),
            output: format!("{}\n{}", stdout.trim(), stderr.trim()).trim().to_string(),
        }
        .into())
    }

    /// Run without taking [`GIT_LOCK`]. Callers must hold it.
    fn run_locked(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(command = %Self::describe(args), "running git");
        let output = self.command(args).output().map_err(GitError::Spawn)?;
        Self::check(args, output)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let _guard = git_lock();
        self.run_locked(args)
    }

    /// Run a fetch, retrying once if it lost a ref-lock race.
    fn run_fetch(&self, args: &[&str]) -> Result<String> {
        let _guard = git_lock();
        match self.run_locked(args) {
            Err(e)
                if e
                    .downcast_ref::<GitError>()
                    .is_some_and(GitError::is_ref_lock_race) =>
            {
                tracing::info!("fetch lost a ref-lock race, retrying");
                std::thread::sleep(REF_LOCK_RETRY_DELAY);
                self.run_locked(args)
            }
            other => other,
        }
    }

    fn run_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<String> {
        let _guard = git_lock();
        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(GitError::Spawn)?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(GitError::Spawn)? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    command: Self::describe(args),
                    timeout,
                }
                .into());
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_end(&mut stdout).map_err(GitError::Spawn)?;
        }
        if let Some(mut err) = child.stderr.take() {
            err.read_to_end(&mut stderr).map_err(GitError::Spawn)?;
        }
        Self::check(
            args,
            Output {
                status,
                stdout,
                stderr,
            },
        )
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.repo_path)?)
    }
}

impl GitFacade for GitCli {
    fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_fetch(&["fetch", remote, branch, "--quiet"])?;
        Ok(())
    }

    fn status(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run(&["status", "--porcelain", "-z"])?;
        Ok(parse::parse_porcelain_status(&out))
    }

    fn diff_name_status(&self, from: &str, to: &str, paths: &[&str]) -> Result<Vec<StatusEntry>> {
        let range = format!("{from}..{to}");
        let mut args = vec!["diff", "--name-status", "-z", range.as_str(), "--"];
        args.extend_from_slice(paths);
        let out = self.run(&args)?;
        Ok(parse::parse_name_status(&out))
    }

    fn ahead_behind(&self, upstream: &str) -> Result<AheadBehind> {
        let range = format!("HEAD...{upstream}");
        let out = self.run(&["rev-list", "--left-right", "--count", &range])?;
        parse::parse_left_right_count(&out)
    }

    fn merge_ff_only(&self, upstream: &str) -> Result<()> {
        self.run(&["merge", "--ff-only", upstream])?;
        Ok(())
    }

    fn rebase_onto(&self, upstream: &str) -> Result<()> {
        let _guard = git_lock();
        if let Err(e) = self.run_locked(&["rebase", upstream]) {
            if let Err(abort) = self.run_locked(&["rebase", "--abort"]) {
                tracing::warn!("rebase --abort failed: {abort:#}");
            }
            return Err(e);
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        self.run(&["push", remote, &refspec])?;
        Ok(())
    }

    fn read_blob(&self, rev: &str, path: &str) -> Result<String> {
        let _guard = git_lock();
        let repo = self.repo()?;
        let spec = format!("{rev}:{path}");
        let object = repo.revparse_single(&spec).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotFound(spec.clone()),
            _ => GitError::Git2(e),
        })?;
        let blob = object.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    fn object_exists(&self, rev: &str, path: &str) -> Result<bool> {
        let _guard = git_lock();
        let repo = self.repo()?;
        match repo.revparse_single(&format!("{rev}:{path}")) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::Git2(e).into()),
        }
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        let _guard = git_lock();
        let repo = self.repo()?;
        let commit = repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn fetch_marker_mtime(&self) -> Result<Option<DateTime<Utc>>> {
        let git_dir = {
            let _guard = git_lock();
            self.repo()?.path().to_path_buf()
        };
        match std::fs::metadata(git_dir.join("FETCH_HEAD")) {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ls_remote_head(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let out = self.run_with_timeout(&["ls-remote", "--heads", remote, branch], LS_REMOTE_TIMEOUT)?;
        parse::parse_ls_remote(&out, branch)
    }

    fn log_for_path(&self, rev: Option<&str>, path: &str, limit: usize) -> Result<Vec<CommitSummary>> {
        let count = format!("-n{}", limit.max(1));
        let mut args = vec![
            "log",
            count.as_str(),
            "--date=format:%Y-%m-%d %H:%M",
            "--pretty=format:%H%x1f%ad%x1f%an%x1f%s",
        ];
        if let Some(rev) = rev {
            args.push(rev);
        }
        args.extend(["--", path]);
        let out = self.run(&args)?;
        Ok(parse::parse_log(&out))
    }
}
