//! Reconciliation passes over several categories.
//!
//! Passes run from background triggers, so failures are logged and the
//! affected category is skipped.

use chrono::{DateTime, Utc};

use super::snapshot::RemoteSnapshotReader;
use crate::infra::git::GitFacade;
use crate::library::{Category, RowMap, table};
use crate::pending::ReconciliationEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub applied: usize,
    pub removed: usize,
}

impl PassSummary {
    pub fn changed(&self) -> bool {
        self.applied > 0 || self.removed > 0
    }
}

fn local_rows(category: &Category) -> Option<RowMap> {
    match table::load_table(&category.csv_path) {
        Ok(table) => Some(table.by_ipn()),
        Err(e) => {
            tracing::warn!(category = %category.name, "failed to read local table: {e:#}");
            None
        }
    }
}

/// Advance requests whose effect shows up on the fetched remote branch, then
/// drop those already present locally.
pub fn remote_pass<G: GitFacade + ?Sized>(
    engine: &ReconciliationEngine<'_>,
    reader: &RemoteSnapshotReader<'_, G>,
    categories: &[Category],
    now: DateTime<Utc>,
) -> PassSummary {
    let mut summary = PassSummary::default();
    for category in categories {
        if !engine.store().has_any(&category.name) {
            continue;
        }
        let Some(snapshot) = reader.read(category, now) else {
            continue;
        };
        let local = local_rows(category);
        match engine.reconcile_category(&category.name, local.as_ref(), Some(&snapshot.observation())) {
            Ok(outcome) => {
                summary.applied += outcome.applied;
                summary.removed += outcome.removed;
            }
            Err(e) => tracing::warn!(category = %category.name, "remote pass failed: {e:#}"),
        }
    }
    summary
}

/// Drop requests whose effect is present in the local tables.
pub fn local_pass(engine: &ReconciliationEngine<'_>, categories: &[Category]) -> PassSummary {
    let mut summary = PassSummary::default();
    for category in categories {
        if !engine.store().has_any(&category.name) {
            continue;
        }
        let Some(local) = local_rows(category) else {
            continue;
        };
        match engine.reconcile_category(&category.name, Some(&local), None) {
            Ok(outcome) => summary.removed += outcome.removed,
            Err(e) => tracing::warn!(category = %category.name, "local pass failed: {e:#}"),
        }
    }
    summary
}
