use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("No part database found above {0}")]
    RepoNotFound(PathBuf),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid table path: {0}")]
    InvalidPath(PathBuf),

    #[error("CSV error: {0}")]
    Csv(csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = anyhow::Result<T>;
