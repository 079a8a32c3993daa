//! Lookup Index Builder: secondary collection → map keyed by foreign key.

use std::collections::HashMap;

use crate::models::{Record, RecordKey};

/// Foreign key → the last record seen with that key.
///
/// Rebuilt from scratch on every fetch cycle; never patched in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupIndex {
    entries: HashMap<RecordKey, Record>,
    duplicates: usize,
    skipped: usize,
}

impl LookupIndex {
    /// Index `records` by `key_field`. Later records overwrite earlier ones;
    /// records without a usable key are skipped.
    pub fn build(records: impl IntoIterator<Item = Record>, key_field: &str) -> Self {
        let mut index = Self::default();
        for record in records {
            let Some(key) = RecordKey::of(&record, key_field) else {
                index.skipped += 1;
                continue;
            };
            if index.entries.insert(key, record).is_some() {
                index.duplicates += 1;
            }
        }
        if index.duplicates > 0 {
            tracing::debug!(
                key_field,
                duplicates = index.duplicates,
                "Duplicate foreign keys, keeping the last record for each"
            );
        }
        index
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many records were overwritten by a later one with the same key.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// How many records had no usable key.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
