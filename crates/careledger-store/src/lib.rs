//! # careledger-store: Ledger state store interface
//!
//! careledger runs on top of a replicated key-value ledger that it does not
//! own. This crate describes that collaborator and ships an in-memory
//! implementation for tests and single-process hosts.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Invocation (one per request)                 │
//! │  Transaction = read view + pending WriteSet   │
//! └───────────────────────┬───────────────────────┘
//!                         │ commit (all or nothing)
//!                         ▼
//! ┌───────────────────────────────────────────────┐
//! │  LedgerStore                                  │
//! │  ├─ get / put                                 │
//! │  ├─ scan_prefix   (composite-key ranges)      │
//! │  └─ query         (Selector predicate index)  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Reads inside a [`Transaction`] see that transaction's own pending writes.
//! Nothing is visible to other invocations until [`LedgerStore::commit`].

use bytes::Bytes;
use thiserror::Error;

pub mod key;
pub mod memory;
pub mod selector;
pub mod write_set;

pub use key::{composite_key, partial_key, split_key};
pub use memory::InMemoryLedger;
pub use selector::Selector;
pub use write_set::{Transaction, WriteSet};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Write to {key:?} rejected by the ledger: {reason}")]
    WriteRejected { key: String, reason: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Ledger backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A key with its stored value, as returned by scans and queries.
pub type Entry = (String, Bytes);

/// The ledger's world-state interface.
///
/// Iteration order of `scan_prefix` and `query` is the backend's native
/// order (ascending key order for [`InMemoryLedger`]); callers needing a
/// different order must sort.
pub trait LedgerStore {
    /// Reads the committed value at `key`.
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// All committed entries whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<Entry>>;

    /// All committed JSON documents matching `selector`.
    fn query(&self, selector: &Selector) -> Result<Vec<Entry>>;

    /// Applies every write in `writes`, or none of them.
    fn commit(&mut self, writes: WriteSet) -> Result<()>;

    /// Writes a single value.
    fn put(&mut self, key: &str, value: Bytes) -> Result<()> {
        let mut writes = WriteSet::new();
        writes.put(key, value);
        self.commit(writes)
    }
}
