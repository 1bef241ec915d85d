//! Shared test helpers.

pub mod factories;
pub mod fake_git;
pub mod git_repo;

use tempfile::TempDir;

use crate::pending::PendingStore;

/// Store backed by `pending.json` in a fresh temp dir. Keep the dir alive.
pub fn temp_store() -> (TempDir, PendingStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = PendingStore::open(dir.path().join("pending.json"));
    (dir, store)
}
