//! Per-campaign idempotency ledger.
//!
//! Maps a notification key to the last time it fired. The ledger is read and
//! written as a whole; entries are never removed and only ever move forward in
//! time.

use std::collections::btree_map::{BTreeMap, Iter};

use chrono::{DateTime, Utc};

pub mod db;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoLedger(BTreeMap<String, DateTime<Utc>>);

impl MemoLedger {
    pub fn new() -> MemoLedger {
        MemoLedger::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.0.get(key).copied()
    }

    /// Records `key` as fired at `at`. An existing later timestamp wins.
    pub fn record(&mut self, key: impl Into<String>, at: DateTime<Utc>) {
        let entry = self.0.entry(key.into()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    pub fn merge(&mut self, patch: &MemoLedger) {
        for (key, at) in patch.iter() {
            self.record(key.clone(), *at);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> Iter<'_, String, DateTime<Utc>> {
        self.0.iter()
    }
}

impl FromIterator<(String, DateTime<Utc>)> for MemoLedger {
    fn from_iter<I: IntoIterator<Item = (String, DateTime<Utc>)>>(iter: I) -> MemoLedger {
        let mut ledger = MemoLedger::new();
        for (key, at) in iter {
            ledger.record(key, at);
        }
        ledger
    }
}
