//! A single unit of work against the ledger.
//!
//! An [`Invocation`] pairs the [`TxContext`] with a [`Transaction`]: reads see
//! the invocation's own pending writes, and nothing reaches the store until
//! the owner commits the write set. Every entity goes through the tagged
//! document codec on the way in and out.

use bytes::Bytes;
use careledger_store::{LedgerStore, Selector, Transaction, WriteSet};
use careledger_types::document::{self, Document, KIND_FIELD};
use careledger_types::Role;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::context::{Settings, TxContext};
use crate::error::{CoreError, Result};
use crate::identity::{self, Identity};

/// Namespace for audit log ids derived from `(tx_id, sequence)`.
const LOG_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d1c_3a4e_9b2f_4c07_a5e8_1f3d_7c9b_2e40);

pub struct Invocation<'a, S: LedgerStore + ?Sized> {
    ctx: &'a TxContext,
    settings: &'a Settings,
    tx: Transaction<'a, S>,
    next_sequence: u32,
}

impl<'a, S: LedgerStore + ?Sized> Invocation<'a, S> {
    pub fn new(store: &'a S, ctx: &'a TxContext, settings: &'a Settings) -> Self {
        Self {
            ctx,
            settings,
            tx: Transaction::new(store),
            next_sequence: 0,
        }
    }

    /// The authoritative timestamp of this invocation.
    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.timestamp()
    }

    pub fn context(&self) -> &TxContext {
        self.ctx
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn caller_id(&self) -> Result<String> {
        Ok(identity::resolve_caller_id(self.ctx.identity())?)
    }

    pub fn caller_role(&self) -> Result<Role> {
        Ok(identity::resolve_caller_role(
            self.ctx.identity(),
            self.settings,
        )?)
    }

    pub fn caller(&self) -> Result<Identity> {
        Ok(identity::resolve_caller(self.ctx.identity(), self.settings)?)
    }

    /// Next audit log id of this invocation.
    ///
    /// Replicas executing the same transaction derive the same sequence of ids.
    pub(crate) fn next_log_id(&mut self) -> Uuid {
        let name = format!("{}:{}", self.ctx.tx_id(), self.next_sequence);
        self.next_sequence += 1;
        Uuid::new_v5(&LOG_ID_NAMESPACE, name.as_bytes())
    }

    pub(crate) fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.tx.get(key)?.is_some())
    }

    pub(crate) fn load<T: Document>(&self, key: &str) -> Result<Option<T>> {
        match self.tx.get(key)? {
            Some(bytes) => Ok(Some(document::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn save<T: Document>(&mut self, key: String, doc: &T) -> Result<()> {
        let bytes = document::encode(doc)?;
        self.tx.put(key, Bytes::from(bytes));
        Ok(())
    }

    /// Decodes every entry under `prefix`. One undecodable entry fails the scan.
    pub(crate) fn scan<T: Document>(&self, prefix: &str) -> Result<Vec<T>> {
        self.tx
            .scan_prefix(prefix)?
            .iter()
            .map(|(_, bytes)| document::decode(bytes).map_err(CoreError::from))
            .collect()
    }

    /// Runs `selector` restricted to documents of kind `T`.
    ///
    /// One undecodable match fails the whole query.
    pub(crate) fn query<T: Document>(&self, selector: Selector) -> Result<Vec<T>> {
        let selector = Selector::equals(KIND_FIELD, T::KIND.as_str()).and(selector);
        self.tx
            .query(&selector)?
            .iter()
            .map(|(_, bytes)| document::decode(bytes).map_err(CoreError::from))
            .collect()
    }

    pub fn pending_writes(&self) -> usize {
        self.tx.pending().len()
    }

    pub fn into_write_set(self) -> WriteSet {
        self.tx.into_write_set()
    }
}
