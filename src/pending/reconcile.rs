//! Reconciliation of pending requests against local and remote tables.
//!
//! A request moves `submitted -> applied_remote` once its effect shows up on
//! the fetched remote branch, and is removed from the store once its effect
//! shows up in the local working copy. The pure functions here compute the new
//! list; [`ReconciliationEngine`] writes it back to a [`PendingStore`].

use chrono::{DateTime, Utc};

use super::error::Result;
use super::matching::unique_match;
use super::model::{Action, PendingRequest, PendingState};
use super::store::PendingStore;
use crate::infra::git::GitFacade;
use crate::library::RowMap;

/// Rows read from `origin/<branch>` together with the fetch they came from.
#[derive(Debug, Clone, Copy)]
pub struct RemoteObservation<'a> {
    pub rows: &'a RowMap,
    /// `FETCH_HEAD` mtime of the fetch that produced `rows`.
    pub fetch_mtime: DateTime<Utc>,
}

/// Result of one reconciliation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Requests that remain pending, in their original order.
    pub items: Vec<PendingRequest>,
    /// Requests that moved to `applied_remote` in this step.
    pub applied: usize,
    /// Requests removed because their effect is present locally.
    pub removed: usize,
    /// Whether `items` differs from the input.
    pub changed: bool,
}

impl Outcome {
    fn unchanged(items: &[PendingRequest]) -> Self {
        Self {
            items: items.to_vec(),
            ..Self::default()
        }
    }
}

/// True if the remote row map already reflects an update's column changes.
fn update_reflected(req: &PendingRequest, rows: &RowMap) -> bool {
    let ipn = req.target_ipn();
    if ipn.is_empty() || req.set_fields.is_empty() {
        return false;
    }
    let Some(row) = rows.get(ipn) else {
        return false;
    };
    req.set_fields
        .iter()
        .all(|(col, value)| row.get(col).map(String::as_str).unwrap_or("") == value)
}

fn delete_reflected(req: &PendingRequest, rows: &RowMap) -> bool {
    let ipn = req.target_ipn();
    !ipn.is_empty() && !rows.contains_key(ipn)
}

/// A remote snapshot only says something about a request if it came from a
/// fetch newer than the one the request was submitted against.
fn observation_is_newer(req: &PendingRequest, fetch_mtime: DateTime<Utc>) -> bool {
    req.fetch_mtime_at_submit
        .is_none_or(|at_submit| fetch_mtime > at_submit)
}

/// Advance `submitted` requests whose effect is visible on the remote branch.
///
/// `local` (the current working-copy rows, if known) keeps pending adds from
/// resolving to rows that already existed locally.
pub fn apply_remote(
    items: &[PendingRequest],
    remote: &RemoteObservation<'_>,
    local: Option<&RowMap>,
) -> Outcome {
    let mut outcome = Outcome::unchanged(items);

    for req in &mut outcome.items {
        if req.state == PendingState::AppliedRemote
            || !observation_is_newer(req, remote.fetch_mtime)
        {
            continue;
        }

        if !req.seen_remote {
            req.seen_remote = true;
            outcome.changed = true;
        }

        let applied = match req.action {
            Action::Delete => delete_reflected(req, remote.rows),
            Action::Update => update_reflected(req, remote.rows),
            Action::Add => match req.resolved() {
                Some(ipn) => remote.rows.contains_key(ipn),
                None => {
                    let already_local = |ipn: &str| {
                        req.matched_before_submit(ipn) || local.is_some_and(|l| l.contains_key(ipn))
                    };
                    match unique_match(&req.fields, remote.rows, already_local) {
                        Some(ipn) => {
                            req.resolved_ipn = ipn.to_string();
                            true
                        }
                        None => false,
                    }
                }
            },
        };

        if applied {
            tracing::debug!(category = %req.category, request = %req.label(), "applied on remote");
            req.state = PendingState::AppliedRemote;
            outcome.applied += 1;
            outcome.changed = true;
        }
    }

    outcome
}

/// An unresolved add counts as present locally only through a unique match
/// that is not one of the rows it already matched when submitted. Without that
/// record there is no telling a new row from an old one, so it never counts.
fn local_add_resolved(req: &PendingRequest, local: &RowMap) -> bool {
    req.local_matches_at_submit.is_some()
        && unique_match(&req.fields, local, |ipn| req.matched_before_submit(ipn)).is_some()
}

/// Remove requests whose effect is present in the local rows.
///
/// Applies to both `submitted` and `applied_remote` requests: a change that
/// reached the working copy out of band needs no remote confirmation.
pub fn apply_local(items: &[PendingRequest], local: &RowMap) -> Outcome {
    let mut outcome = Outcome::default();

    for req in items {
        let synced = match req.action {
            Action::Delete => delete_reflected(req, local),
            Action::Update => update_reflected(req, local),
            Action::Add => match req.resolved() {
                Some(ipn) => local.contains_key(ipn),
                None => local_add_resolved(req, local),
            },
        };

        if synced {
            tracing::debug!(category = %req.category, request = %req.label(), "synced locally");
            outcome.removed += 1;
            outcome.changed = true;
        } else {
            outcome.items.push(req.clone());
        }
    }

    outcome
}

/// Run the remote step (if a snapshot is available) followed by the local
/// step (if the local table is available).
pub fn reconcile(
    items: &[PendingRequest],
    local: Option<&RowMap>,
    remote: Option<&RemoteObservation<'_>>,
) -> Outcome {
    let after_remote = match remote {
        Some(remote) => apply_remote(items, remote, local),
        None => Outcome::unchanged(items),
    };
    let Some(local) = local else {
        return after_remote;
    };
    let after_local = apply_local(&after_remote.items, local);
    Outcome {
        items: after_local.items,
        applied: after_remote.applied,
        removed: after_local.removed,
        changed: after_remote.changed || after_local.changed,
    }
}

/// Drop `applied_remote` requests once the working copy is known to be in
/// sync with the remote branch.
///
/// A request whose file still exists at `HEAD` is kept: CI has not deleted it
/// yet, so the change may not be part of what was pulled.
pub fn drop_applied_if_synced(
    items: &[PendingRequest],
    request_file_at_head: impl Fn(&str) -> Option<bool>,
) -> Outcome {
    let mut outcome = Outcome::default();
    for req in items {
        let drop = req.is_applied_remote() && {
            let path = req.req_path.trim();
            path.is_empty() || request_file_at_head(path) == Some(false)
        };
        if drop {
            outcome.removed += 1;
            outcome.changed = true;
        } else {
            outcome.items.push(req.clone());
        }
    }
    outcome
}

/// Applies reconciliation results to a [`PendingStore`].
pub struct ReconciliationEngine<'s> {
    store: &'s PendingStore,
}

impl<'s> ReconciliationEngine<'s> {
    pub fn new(store: &'s PendingStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s PendingStore {
        self.store
    }

    /// Reconcile one category and persist the result if anything changed.
    pub fn reconcile_category(
        &self,
        category: &str,
        local: Option<&RowMap>,
        remote: Option<&RemoteObservation<'_>>,
    ) -> Result<Outcome> {
        let items = self.store.list_for(category);
        if items.is_empty() {
            return Ok(Outcome::default());
        }

        let outcome = reconcile(&items, local, remote);
        if outcome.changed {
            self.store.set_items(category, outcome.items.clone())?;
            tracing::info!(
                category,
                applied = outcome.applied,
                removed = outcome.removed,
                remaining = outcome.items.len(),
                "reconciled pending requests"
            );
        }
        Ok(outcome)
    }

    /// Drop `applied_remote` requests of a category whose request file is gone
    /// from `HEAD`. Callers must only invoke this when the working copy is up to
    /// date with the remote branch.
    pub fn drop_applied_if_synced<G: GitFacade + ?Sized>(
        &self,
        category: &str,
        git: &G,
    ) -> Result<bool> {
        let items = self.store.list_for(category);
        if !items.iter().any(PendingRequest::is_applied_remote) {
            return Ok(false);
        }

        let outcome = drop_applied_if_synced(&items, |path| {
            git.object_exists("HEAD", path)
                .inspect_err(|e| tracing::warn!(path, "could not check request file: {e:#}"))
                .ok()
        });
        if outcome.changed {
            self.store.set_items(category, outcome.items)?;
            tracing::info!(category, dropped = outcome.removed, "dropped synced requests");
        }
        Ok(outcome.changed)
    }
}
