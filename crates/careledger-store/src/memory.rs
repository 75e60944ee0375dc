//! In-memory ledger.
//!
//! Ordered map backed, so iteration is deterministic. Selector queries parse
//! each value as JSON and skip values that are not JSON documents, as an
//! external document index would. Write rejection can be injected for
//! failure-path tests.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::{Entry, LedgerStore, Result, Selector, StoreError, WriteSet};

#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    entries: BTreeMap<String, Bytes>,
    /// Key prefixes whose writes fail the whole commit.
    rejected_prefixes: Vec<String>,
    commits: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every commit touching a key with `prefix` fail.
    pub fn reject_writes_with_prefix(&mut self, prefix: impl Into<String>) {
        self.rejected_prefixes.push(prefix.into());
    }

    /// Clears all injected write failures.
    pub fn accept_all_writes(&mut self) {
        self.rejected_prefixes.clear();
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl LedgerStore for InMemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.entries.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let results: Vec<Entry> = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        debug!(prefix = ?prefix, matched = results.len(), "Prefix scan");
        Ok(results)
    }

    fn query(&self, selector: &Selector) -> Result<Vec<Entry>> {
        let results: Vec<Entry> = self
            .entries
            .iter()
            .filter(|(_, value)| {
                serde_json::from_slice::<Value>(value).is_ok_and(|doc| selector.matches(&doc))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        debug!(query = %selector, matched = results.len(), "Selector query");
        Ok(results)
    }

    fn commit(&mut self, writes: WriteSet) -> Result<()> {
        // Validate the whole set first so a rejection applies nothing
        for key in writes.keys() {
            if let Some(prefix) = self
                .rejected_prefixes
                .iter()
                .find(|prefix| key.starts_with(prefix.as_str()))
            {
                return Err(StoreError::WriteRejected {
                    key: key.to_string(),
                    reason: format!("writes under {prefix:?} are rejected"),
                });
            }
        }

        let count = writes.len();
        for (key, value) in writes {
            self.entries.insert(key, value);
        }
        self.commits += 1;
        debug!(writes = count, commit = self.commits, "Committed write set");
        Ok(())
    }
}
