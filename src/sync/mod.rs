//! Remote sync state: staleness, remote snapshots, status evaluation and the
//! reconciliation passes driven by fetches and local edits.

pub mod passes;
mod remote_sha;
mod snapshot;
mod staleness;
pub mod status;
mod trigger;

pub use remote_sha::RemoteShaCache;
pub use snapshot::RemoteSnapshotReader;
pub use status::{Scope, StatusColor, SyncReport, SyncStatusEvaluator};
pub use trigger::{FetchTrigger, LocalChangeTracker};
