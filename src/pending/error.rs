use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PendingError {
    #[error("Failed to get config directory")]
    ConfigDirNotFound,

    #[error("Failed to write pending requests to {path}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Timed out waiting for lock on pending requests after {0:?}")]
    LockTimeout(Duration),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("A delete request for {ipn} in {category} is already pending")]
    DuplicateDelete { category: String, ipn: String },

    #[error("{ipn} in {category} is pending deletion")]
    PendingDeletion { category: String, ipn: String },
}

pub type Result<T> = anyhow::Result<T>;
