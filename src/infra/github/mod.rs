//! GitHub REST access used to submit change requests.
//!
//! Authentication reuses the GitHub CLI login when no token is set in the
//! environment.

mod client;
pub(crate) mod error;
#[cfg(test)]
pub mod mock;
mod token;

pub use client::{ContentsClient, CreateFileRequest, GitHubClient};
pub use error::GitHubError;
pub use token::resolve_token;
