//! Change detection that decides when reconciliation passes run.

use std::collections::HashMap;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::library::Category;

/// Fires when `FETCH_HEAD` moves forward, whoever ran the fetch.
#[derive(Debug, Default)]
pub struct FetchTrigger {
    last: Option<DateTime<Utc>>,
}

impl FetchTrigger {
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self { last: initial }
    }

    /// Record `current` and report whether it advanced past the last value.
    pub fn advanced(&mut self, current: Option<DateTime<Utc>>) -> bool {
        match (current, self.last) {
            (Some(now), Some(last)) if now <= last => false,
            (Some(now), _) => {
                self.last = Some(now);
                true
            }
            (None, _) => false,
        }
    }
}

/// Tracks category table mtimes between polls.
#[derive(Debug, Default)]
pub struct LocalChangeTracker {
    mtimes: HashMap<String, Option<SystemTime>>,
}

fn mtime(category: &Category) -> Option<SystemTime> {
    std::fs::metadata(&category.csv_path)
        .and_then(|m| m.modified())
        .ok()
}

impl LocalChangeTracker {
    /// Start tracking with the current mtimes as baseline.
    pub fn new(categories: &[Category]) -> Self {
        Self {
            mtimes: categories
                .iter()
                .map(|c| (c.name.clone(), mtime(c)))
                .collect(),
        }
    }

    /// Names of categories whose table changed since the last call.
    /// Newly seen categories count as changed.
    pub fn changed(&mut self, categories: &[Category]) -> Vec<String> {
        categories
            .iter()
            .filter_map(|c| {
                let current = mtime(c);
                let previous = self.mtimes.insert(c.name.clone(), current);
                (previous != Some(current)).then(|| c.name.clone())
            })
            .collect()
    }
}
