//! Best-effort identification of the row a pending add turned into.

use std::collections::BTreeMap;

use crate::library::{Row, RowMap};

/// Columns that identify a part well enough to match a proposed row against
/// rows CI created from it.
pub const IDENTITY_COLUMNS: [&str; 6] = [
    "MPN",
    "Manufacturer",
    "Value",
    "Footprint",
    "Symbol",
    "Description",
];

/// Minimum number of non-empty identity columns needed to attempt a match.
const MIN_IDENTITY_COLUMNS: usize = 2;

/// Non-empty identity columns of a proposed row, trimmed.
fn identity_of(fields: &BTreeMap<String, String>) -> Vec<(&'static str, &str)> {
    IDENTITY_COLUMNS
        .iter()
        .filter_map(|col| {
            let value = fields.get(*col)?.trim();
            (!value.is_empty()).then_some((*col, value))
        })
        .collect()
}

fn row_matches(row: &Row, identity: &[(&str, &str)]) -> bool {
    identity
        .iter()
        .all(|(col, value)| row.get(*col).map(|v| v.trim()) == Some(*value))
}

/// Find the single row matching the proposed fields.
///
/// Returns `None` when fewer than two identity columns are filled in, when no
/// row matches, or when more than one does. `exclude` filters out candidates
/// that must not count (rows that already existed locally).
pub fn unique_match<'a>(
    fields: &BTreeMap<String, String>,
    rows: &'a RowMap,
    exclude: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    let identity = identity_of(fields);
    if identity.len() < MIN_IDENTITY_COLUMNS {
        return None;
    }

    let mut candidates = rows
        .iter()
        .filter(|(ipn, _)| !exclude(ipn))
        .filter(|(_, row)| row_matches(row, &identity))
        .map(|(ipn, _)| ipn.as_str());

    let first = candidates.next()?;
    match candidates.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// IPNs of every row matching the proposed fields, in IPN order.
///
/// Empty when fewer than two identity columns are filled in.
pub fn matching_ipns(fields: &BTreeMap<String, String>, rows: &RowMap) -> Vec<String> {
    let identity = identity_of(fields);
    if identity.len() < MIN_IDENTITY_COLUMNS {
        return Vec::new();
    }
    rows.iter()
        .filter(|(_, row)| row_matches(row, &identity))
        .map(|(ipn, _)| ipn.clone())
        .collect()
}
