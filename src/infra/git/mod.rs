//! Git access for the database working copy.
//!
//! [`GitFacade`] is the seam the rest of the crate depends on; [`GitCli`] is
//! the production implementation.

mod cli;
pub mod error;
pub mod facade;
mod github;
mod parse;

pub use cli::GitCli;
pub use facade::{AheadBehind, CommitSummary, GitFacade};
pub use github::{GitHubRemote, parse_github_url};
