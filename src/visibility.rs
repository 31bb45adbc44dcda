//! Session-scoped column visibility persistence
//!
//! One record per entity kind, shared by every instance of that kind:
//! relation-scoped grids and top-level grids read and write the same entry.
//! Read at instance construction, written on visibility-menu change; lives
//! for the user session, no server round-trip.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct VisibilityStore {
    records: Mutex<HashMap<String, Vec<String>>>,
}

impl VisibilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordered visible-column keys for a kind, if a record exists
    pub fn visible_columns(&self, kind: &str) -> Option<Vec<String>> {
        self.records
            .lock()
            .expect("visibility store lock poisoned")
            .get(kind)
            .cloned()
    }

    pub fn store(&self, kind: &str, keys: Vec<String>) {
        self.records
            .lock()
            .expect("visibility store lock poisoned")
            .insert(kind.to_string(), keys);
    }
}
