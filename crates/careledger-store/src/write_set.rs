//! Pending writes and the read-your-own-writes transaction view.

use std::collections::BTreeMap;
use std::collections::btree_map;

use bytes::Bytes;
use serde_json::Value;

use crate::{Entry, LedgerStore, Result, Selector};

/// Writes staged by one invocation, keyed for deterministic ordering.
///
/// A later write to the same key replaces the earlier one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSet {
    writes: BTreeMap<String, Bytes>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.writes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.writes.get(key)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for WriteSet {
    type Item = (String, Bytes);
    type IntoIter = btree_map::IntoIter<String, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Read view over a committed store plus this transaction's pending writes.
///
/// The view borrows the store immutably; the pending [`WriteSet`] is handed
/// back with [`Transaction::into_write_set`] and committed by the owner.
pub struct Transaction<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    pending: WriteSet,
}

impl<'a, S: LedgerStore + ?Sized> Transaction<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            pending: WriteSet::new(),
        }
    }

    /// Reads `key`, preferring this transaction's own pending write.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match self.pending.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.store.get(key),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.pending.put(key, value);
    }

    /// Prefix scan merged with pending writes, in ascending key order.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let mut merged: BTreeMap<String, Bytes> =
            self.store.scan_prefix(prefix)?.into_iter().collect();
        for (key, value) in self.pending.iter() {
            if key.starts_with(prefix) {
                merged.insert(key.to_string(), value.clone());
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// Predicate query merged with pending writes.
    ///
    /// A pending write shadows the committed value at the same key, whether
    /// or not the pending value still matches.
    pub fn query(&self, selector: &Selector) -> Result<Vec<Entry>> {
        let mut merged: BTreeMap<String, Bytes> = self
            .store
            .query(selector)?
            .into_iter()
            .filter(|(key, _)| self.pending.get(key).is_none())
            .collect();
        for (key, value) in self.pending.iter() {
            let matches = serde_json::from_slice::<Value>(value)
                .map(|doc| selector.matches(&doc))
                .unwrap_or(false);
            if matches {
                merged.insert(key.to_string(), value.clone());
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn pending(&self) -> &WriteSet {
        &self.pending
    }

    pub fn into_write_set(self) -> WriteSet {
        self.pending
    }
}
