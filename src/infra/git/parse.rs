//! Parsers for git plumbing output.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{GitError, Result};
use super::facade::{AheadBehind, CommitSummary, StatusEntry};

#[expect(clippy::unwrap_used, reason = "static pattern")]
static REF_LOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cannot lock ref 'refs/remotes/[^']*'.*expected").unwrap());

#[expect(clippy::unwrap_used, reason = "static pattern")]
static SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,64}$").unwrap());

/// Field separator used in `git log --pretty=format:` output.
pub const LOG_SEPARATOR: char = '\x1f';

pub fn is_ref_lock_race(command: &str, output: &str) -> bool {
    command.split_whitespace().any(|arg| arg == "fetch")
        && output.lines().any(|line| REF_LOCK_RE.is_match(line))
}

/// Parse `git status --porcelain -z`.
///
/// Renames and copies carry the original path as an extra NUL-separated field,
/// which is skipped.
pub fn parse_porcelain_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut tokens = output.split('\0');
    while let Some(token) = tokens.next() {
        if token.len() < 4 {
            continue;
        }
        let (flag, path) = token.split_at(3);
        let flag = flag.trim_end();
        if flag.starts_with('R') || flag.starts_with('C') {
            tokens.next();
        }
        entries.push(StatusEntry {
            flag: flag.trim().to_string(),
            path: path.to_string(),
        });
    }
    entries
}

/// Parse `git diff --name-status -z`. For renames and copies the new path is
/// reported.
pub fn parse_name_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut tokens = output.split('\0').filter(|t| !t.is_empty());
    while let Some(flag) = tokens.next() {
        let flag = flag.trim();
        let Some(mut path) = tokens.next() else {
            break;
        };
        if flag.starts_with('R') || flag.starts_with('C') {
            match tokens.next() {
                Some(new_path) => path = new_path,
                None => break,
            }
        }
        entries.push(StatusEntry {
            flag: flag.to_string(),
            path: path.trim().to_string(),
        });
    }
    entries
}

/// Parse `git rev-list --left-right --count A...B`.
pub fn parse_left_right_count(output: &str) -> Result<AheadBehind> {
    let mut parts = output.split_whitespace().map(str::parse::<u32>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(ahead)), Some(Ok(behind)), None) => Ok(AheadBehind { ahead, behind }),
        _ => Err(GitError::UnexpectedOutput(format!("rev-list --count: {output:?}")).into()),
    }
}

/// Parse `git ls-remote --heads <remote> <branch>`. Empty output means the
/// branch does not exist on the remote.
pub fn parse_ls_remote(output: &str, branch: &str) -> Result<Option<String>> {
    let wanted = format!("refs/heads/{branch}");
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split_whitespace();
        let (Some(sha), Some(refname)) = (fields.next(), fields.next()) else {
            return Err(GitError::UnexpectedOutput(format!("ls-remote: {line:?}")).into());
        };
        if refname == wanted {
            if !SHA_RE.is_match(sha) {
                return Err(GitError::UnexpectedOutput(format!("ls-remote: {line:?}")).into());
            }
            return Ok(Some(sha.to_string()));
        }
    }
    Ok(None)
}

/// Parse `git log --pretty=format:%H%x1f%ad%x1f%an%x1f%s`.
pub fn parse_log(output: &str) -> Vec<CommitSummary> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, LOG_SEPARATOR).map(str::trim);
            let sha = parts.next().filter(|s| !s.is_empty())?;
            Some(CommitSummary {
                sha: sha.to_string(),
                date: parts.next()?.to_string(),
                author: parts.next()?.to_string(),
                subject: parts.next()?.to_string(),
            })
        })
        .collect()
}
