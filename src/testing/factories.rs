//! Test factories with sensible defaults.
//!
//! Use `pending_with()` to customize specific fields:
//!
//! ```ignore
//! let req = pending_with(pending_delete("Resistors", "R0001"), |r| {
//!     r.state = PendingState::AppliedRemote;
//! });
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};

use crate::library::{Category, RowMap, table};
use crate::pending::PendingRequest;
use crate::pending::model::{Action, PendingState};

/// Timestamp `secs` seconds after the epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("valid timestamp")
}

pub fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Rows keyed by their `IPN` column.
pub fn row_map(rows: &[&[(&str, &str)]]) -> RowMap {
    rows.iter()
        .map(|row| {
            let row = fields(row);
            let ipn = row.get(table::IPN_COLUMN).cloned().unwrap_or_default();
            (ipn, row)
        })
        .collect()
}

fn pending(category: &str, action: Action, ipn: &str) -> PendingRequest {
    let slug = if ipn.is_empty() { "new" } else { ipn };
    PendingRequest {
        category: category.to_string(),
        action,
        ipn: ipn.to_string(),
        resolved_ipn: String::new(),
        fields: BTreeMap::new(),
        local_matches_at_submit: None,
        set_fields: BTreeMap::new(),
        created_at: at(0),
        fetch_mtime_at_submit: None,
        origin_sha_at_submit: String::new(),
        seen_remote: false,
        state: PendingState::Submitted,
        req_path: format!("Requests/test_{}_{slug}.json", action.as_str()),
    }
}

pub fn pending_add(category: &str, proposed: &[(&str, &str)]) -> PendingRequest {
    PendingRequest {
        fields: fields(proposed),
        ..pending(category, Action::Add, "")
    }
}

pub fn pending_update(category: &str, ipn: &str, set: &[(&str, &str)]) -> PendingRequest {
    PendingRequest {
        set_fields: fields(set),
        ..pending(category, Action::Update, ipn)
    }
}

pub fn pending_delete(category: &str, ipn: &str) -> PendingRequest {
    pending(category, Action::Delete, ipn)
}

pub fn pending_with(mut req: PendingRequest, f: impl FnOnce(&mut PendingRequest)) -> PendingRequest {
    f(&mut req);
    req
}

pub fn category(name: &str) -> Category {
    let file_name = format!("db-{name}.csv");
    Category {
        name: name.to_string(),
        csv_path: PathBuf::from("/repo/Database").join(&file_name),
        file_name,
    }
}
