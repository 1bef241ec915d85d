//! Git error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not in a git repository: {0}")]
    NotInRepo(String),

    #[error("{command} failed:\n{output}")]
    CommandFailed { command: String, output: String },

    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Could not parse GitHub URL: {0}")]
    InvalidGitHubUrl(String),

    #[error("Unexpected git output: {0}")]
    UnexpectedOutput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

impl GitError {
    /// Transient ref-lock race between concurrent fetches, e.g.
    /// `cannot lock ref 'refs/remotes/origin/main': is at ... but expected ...`.
    pub fn is_ref_lock_race(&self) -> bool {
        match self {
            Self::CommandFailed { command, output } => {
                super::parse::is_ref_lock_race(command, output)
            }
            _ => false,
        }
    }
}

pub type Result<T> = anyhow::Result<T>;
