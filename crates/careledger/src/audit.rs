//! Audit trail.
//!
//! Append-only. Each entry is stored under the composite key
//! `⟨namespace⟩⟨action⟩⟨actorId⟩⟨logId⟩`, so a partial key over the
//! namespace (optionally narrowed by action, then actor) is a range scan.
//! Field-level lookups go through the ledger's predicate index.
//!
//! Entries written by other operations share the triggering operation's
//! write set: the primary write and its audit entry commit together or not
//! at all.

use std::collections::BTreeMap;

use careledger_store::{LedgerStore, Selector, composite_key, partial_key};
use careledger_types::{ActorRole, AuditAction, AuditEntry, Role, timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::guard::RoleProof;
use crate::invocation::Invocation;

/// Caller-supplied fields of an audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub actor_id: String,
    pub target_id: String,
    pub record_id: String,
    pub success: bool,
    pub message: String,
}

impl NewAuditEntry {
    pub fn new(
        action: AuditAction,
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        record_id: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action,
            actor_id: actor_id.into(),
            target_id: target_id.into(),
            record_id: record_id.into(),
            success,
            message: message.into(),
        }
    }

    pub fn success(
        action: AuditAction,
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        record_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(action, actor_id, target_id, record_id, true, message)
    }

    pub fn failure(
        action: AuditAction,
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        record_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(action, actor_id, target_id, record_id, false, message)
    }
}

/// Stages an audit entry in the invocation's write set.
///
/// The actor role is the caller's resolved role; a caller whose role cannot
/// be resolved is recorded as `unknown` rather than failing the write.
pub(crate) fn append<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    new: NewAuditEntry,
) -> Result<AuditEntry> {
    if new.actor_id.is_empty() {
        return Err(CoreError::validation("actorId must not be empty"));
    }

    let actor_role = match inv.caller_role() {
        Ok(role) => ActorRole::from(role),
        Err(err) => {
            debug!(error = %err, "Actor role unresolved, recording as unknown");
            ActorRole::Unknown
        }
    };
    let log_id = inv.next_log_id();
    let entry = AuditEntry {
        log_id,
        action: new.action,
        actor_id: new.actor_id,
        actor_role,
        target_id: new.target_id,
        record_id: new.record_id,
        timestamp: inv.now(),
        ip_address: inv.context().client_address().map(str::to_string),
        success: new.success,
        message: new.message,
    };

    let log_id = log_id.to_string();
    let key = composite_key(
        &inv.settings().audit_namespace,
        &[entry.action.as_str(), &entry.actor_id, &log_id],
    )?;
    inv.save(key, &entry)?;

    debug!(
        log_id = %entry.log_id,
        action = %entry.action,
        actor = %entry.actor_id,
        success = entry.success,
        "Audit entry staged"
    );
    Ok(entry)
}

/// Records an entry on behalf of any resolved caller.
pub fn create_audit_log<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    proof: &RoleProof,
    new: NewAuditEntry,
) -> Result<AuditEntry> {
    debug!(caller = %proof.caller_id(), action = %new.action, "Audit entry requested");
    append(inv, new)
}

// ============================================================================
// Queries
// ============================================================================

pub fn query_audit_logs_by_actor<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    actor_id: &str,
) -> Result<Vec<AuditEntry>> {
    inv.query(Selector::equals("actorId", actor_id))
}

pub fn query_audit_logs_by_action<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    action: AuditAction,
) -> Result<Vec<AuditEntry>> {
    inv.query(Selector::equals("action", action.as_str()))
}

pub fn query_audit_logs_by_record<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    record_id: &str,
) -> Result<Vec<AuditEntry>> {
    inv.query(Selector::equals("recordId", record_id))
}

/// Entries with `start <= timestamp <= end`.
pub fn query_audit_logs_by_time_range<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<AuditEntry>> {
    if start > end {
        return Err(CoreError::validation(format!(
            "time range start {} is after end {}",
            timestamp::canonical(&start),
            timestamp::canonical(&end)
        )));
    }
    inv.query(Selector::range(
        "timestamp",
        Some(timestamp::canonical(&start)),
        Some(timestamp::canonical(&end)),
    ))
}

/// The whole audit trail, by key scan. Admin only.
pub fn get_all_audit_logs<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    proof: &RoleProof,
) -> Result<Vec<AuditEntry>> {
    proof.ensure(Role::Admin)?;
    let prefix = partial_key(&inv.settings().audit_namespace, &[])?;
    inv.scan(&prefix)
}

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate view of the audit trail for compliance dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub by_action: BTreeMap<AuditAction, usize>,
    pub by_role: BTreeMap<ActorRole, usize>,
    /// Share of successful entries, in percent. Zero for an empty trail.
    pub success_rate: f64,
}

impl AuditStatistics {
    pub fn from_entries<'e>(entries: impl IntoIterator<Item = &'e AuditEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total += 1;
            if entry.success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            *stats.by_action.entry(entry.action).or_default() += 1;
            *stats.by_role.entry(entry.actor_role).or_default() += 1;
        }
        if stats.total > 0 {
            stats.success_rate = stats.successful as f64 * 100.0 / stats.total as f64;
        }
        stats
    }
}

/// Counts over the whole audit trail. Admin only.
pub fn audit_statistics<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    proof: &RoleProof,
) -> Result<AuditStatistics> {
    let entries = get_all_audit_logs(inv, proof)?;
    Ok(AuditStatistics::from_entries(&entries))
}

/// Orders entries by timestamp, oldest first; ties break on log id.
pub fn sort_chronologically(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.log_id.cmp(&b.log_id))
    });
}
