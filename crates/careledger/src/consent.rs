//! Consent ledger.
//!
//! Grants are stored under the caller-supplied consent id. Alongside each
//! grant, a scope index entry maps `patient|doctor|record` (or
//! `patient|doctor|*`) to that consent id; [`check_consent`] resolves access
//! through the index, specific scope first, wildcard second. An index entry
//! whose consent id has since been re-granted elsewhere is stale; the scope is
//! then answered by the latest grant still stored for it.
//!
//! # Key layout
//!
//! ```text
//! consent      ⟨consentId⟩                     -> ConsentGrant
//! consentScope ⟨patientId⟩⟨doctorId⟩⟨record|*⟩ -> ConsentScopeEntry
//! ```

use careledger_store::{LedgerStore, Selector, composite_key};
use careledger_types::{AuditAction, ConsentGrant, ConsentScope, ConsentScopeEntry, Role};
use chrono::Duration;
use tracing::{debug, info};

use crate::audit::{self, NewAuditEntry};
use crate::context::Settings;
use crate::error::{CoreError, Result};
use crate::guard::{PatientOrAdmin, RoleProof};
use crate::invocation::Invocation;

pub const CONSENT_NAMESPACE: &str = "consent";
pub const SCOPE_NAMESPACE: &str = "consentScope";

/// Arguments of a consent grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantConsent {
    pub consent_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// A record id; empty or `*` grants every record of the patient.
    pub record_id: String,
    pub expiry_days: u32,
}

impl GrantConsent {
    pub fn new(
        consent_id: impl Into<String>,
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        record_id: impl Into<String>,
        expiry_days: u32,
    ) -> Self {
        Self {
            consent_id: consent_id.into(),
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            record_id: record_id.into(),
            expiry_days,
        }
    }

    pub fn scope(&self) -> ConsentScope {
        ConsentScope::from_record_id(&self.record_id)
    }

    pub fn validate(&self, settings: &Settings) -> Result<()> {
        for (field, value) in [
            ("consentId", &self.consent_id),
            ("patientId", &self.patient_id),
            ("doctorId", &self.doctor_id),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::validation(format!("{field} must not be empty")));
            }
        }
        if self.expiry_days == 0 || self.expiry_days > settings.max_expiry_days {
            return Err(CoreError::validation(format!(
                "expiryDays must be between 1 and {}, got {}",
                settings.max_expiry_days, self.expiry_days
            )));
        }
        Ok(())
    }
}

/// The `patient|doctor|record` convention for consent ids.
pub fn consent_scope_key(patient_id: &str, doctor_id: &str, record_id: &str) -> String {
    let scope = ConsentScope::from_record_id(record_id);
    format!("{patient_id}|{doctor_id}|{}", scope.as_record_id())
}

fn consent_key(consent_id: &str) -> Result<String> {
    Ok(composite_key(CONSENT_NAMESPACE, &[consent_id])?)
}

fn scope_index_key(patient_id: &str, doctor_id: &str, scope: &ConsentScope) -> Result<String> {
    Ok(composite_key(
        SCOPE_NAMESPACE,
        &[patient_id, doctor_id, scope.as_record_id()],
    )?)
}

/// Loads a grant by id.
pub fn get_consent<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    consent_id: &str,
) -> Result<ConsentGrant> {
    inv.load(&consent_key(consent_id)?)?
        .ok_or_else(|| CoreError::not_found("consent", consent_id))
}

/// Writes (or replaces) the grant at `consentId` and emits `GRANT_CONSENT`.
///
/// The previous grant at the same id, if any, is overwritten whole.
pub fn grant_consent<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    proof: &PatientOrAdmin,
    request: GrantConsent,
) -> Result<ConsentGrant> {
    request.validate(inv.settings())?;
    proof.ensure_covers(&request.patient_id)?;

    let now = inv.now();
    let scope = request.scope();
    let key = consent_key(&request.consent_id)?;
    let index_key = scope_index_key(&request.patient_id, &request.doctor_id, &scope)?;
    let replaced = inv.exists(&key)?;
    let expiry_at = Duration::try_days(i64::from(request.expiry_days))
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            CoreError::validation(format!(
                "expiryDays {} puts the expiry beyond the representable time range",
                request.expiry_days
            ))
        })?;

    let grant = ConsentGrant {
        consent_id: request.consent_id,
        patient_id: request.patient_id,
        doctor_id: request.doctor_id,
        record_id: scope.as_record_id().to_string(),
        granted: true,
        issued_at: now,
        expiry_at,
        granted_by: proof.caller_id().to_string(),
    };
    let entry = ConsentScopeEntry {
        scope_key: consent_scope_key(&grant.patient_id, &grant.doctor_id, &grant.record_id),
        consent_id: grant.consent_id.clone(),
    };

    inv.save(key, &grant)?;
    inv.save(index_key, &entry)?;

    let message = if replaced {
        format!(
            "Consent updated by patient {} for doctor {}",
            grant.patient_id, grant.doctor_id
        )
    } else {
        format!(
            "Consent granted by patient {} to doctor {}",
            grant.patient_id, grant.doctor_id
        )
    };
    audit::append(
        inv,
        NewAuditEntry::success(
            AuditAction::GrantConsent,
            proof.caller_id(),
            &grant.doctor_id,
            &grant.record_id,
            message,
        ),
    )?;

    info!(
        consent = %grant.consent_id,
        patient = %grant.patient_id,
        doctor = %grant.doctor_id,
        record = %grant.record_id,
        expiry = %grant.expiry_at,
        replaced,
        "Consent granted"
    );
    Ok(grant)
}

/// Marks the grant revoked and emits `REVOKE_CONSENT`.
///
/// Only `granted` and `issuedAt` change. The audit entry names the stored
/// doctor and record.
pub fn revoke_consent<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    proof: &PatientOrAdmin,
    consent_id: &str,
) -> Result<ConsentGrant> {
    let mut grant = get_consent(inv, consent_id)?;
    proof.ensure_covers(&grant.patient_id)?;

    grant.revoke(inv.now());
    inv.save(consent_key(consent_id)?, &grant)?;

    audit::append(
        inv,
        NewAuditEntry::success(
            AuditAction::RevokeConsent,
            proof.caller_id(),
            &grant.doctor_id,
            &grant.record_id,
            format!(
                "Consent revoked by patient {} from doctor {}",
                grant.patient_id, grant.doctor_id
            ),
        ),
    )?;

    info!(
        consent = %grant.consent_id,
        patient = %grant.patient_id,
        doctor = %grant.doctor_id,
        "Consent revoked"
    );
    Ok(grant)
}

/// Whether `doctor_id` may access `record_id` of `patient_id` right now.
///
/// The specific scope is looked up first; only if it has no grant is the
/// patient's wildcard grant consulted. A found grant answers on its own: it
/// must be granted and not yet expired.
pub fn check_consent<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
    doctor_id: &str,
    record_id: &str,
) -> Result<bool> {
    let requested = ConsentScope::from_record_id(record_id);
    let mut scopes = vec![requested.clone()];
    if !requested.is_wildcard() {
        scopes.push(ConsentScope::AllRecords);
    }

    for scope in &scopes {
        if let Some(grant) = resolve_scope(inv, patient_id, doctor_id, scope)? {
            let active = grant.is_active(inv.now());
            debug!(
                consent = %grant.consent_id,
                scope = %scope.as_record_id(),
                active,
                "Consent resolved"
            );
            return Ok(active);
        }
    }
    Ok(false)
}

fn resolve_scope<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
    doctor_id: &str,
    scope: &ConsentScope,
) -> Result<Option<ConsentGrant>> {
    let Some(entry) =
        inv.load::<ConsentScopeEntry>(&scope_index_key(patient_id, doctor_id, scope)?)?
    else {
        return Ok(None);
    };
    let grant = inv.load::<ConsentGrant>(&consent_key(&entry.consent_id)?)?;
    match grant {
        Some(grant) if grant.covers(patient_id, doctor_id, scope) => Ok(Some(grant)),
        _ => {
            // The indexed consent id moved to other parties or another scope
            debug!(consent = %entry.consent_id, scope = %entry.scope_key, "Stale scope index entry");
            latest_covering_grant(inv, patient_id, doctor_id, scope)
        }
    }
}

/// The most recently issued (or revoked) grant stored for exactly this scope.
fn latest_covering_grant<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
    doctor_id: &str,
    scope: &ConsentScope,
) -> Result<Option<ConsentGrant>> {
    let grants: Vec<ConsentGrant> = inv.query(
        Selector::equals("patientId", patient_id)
            .and(Selector::equals("doctorId", doctor_id))
            .and(Selector::equals("recordId", scope.as_record_id())),
    )?;
    Ok(grants.into_iter().max_by(|a, b| {
        a.issued_at
            .cmp(&b.issued_at)
            .then_with(|| a.consent_id.cmp(&b.consent_id))
    }))
}

/// Every grant issued by `patient_id`, including revoked and expired ones.
pub fn query_consents_by_patient<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
) -> Result<Vec<ConsentGrant>> {
    inv.query(Selector::equals("patientId", patient_id))
}

/// Grants currently held by `doctor_id`.
///
/// The index cannot compare against the invocation clock, so expired grants
/// are filtered here.
pub fn query_consents_by_doctor<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    doctor_id: &str,
) -> Result<Vec<ConsentGrant>> {
    let now = inv.now();
    let grants: Vec<ConsentGrant> = inv.query(
        Selector::equals("doctorId", doctor_id).and(Selector::equals("granted", true)),
    )?;
    Ok(grants
        .into_iter()
        .filter(|grant| !grant.is_expired(now))
        .collect())
}

/// Every grant on the ledger. Admin only.
pub fn query_all_consents<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    proof: &RoleProof,
) -> Result<Vec<ConsentGrant>> {
    proof.ensure(Role::Admin)?;
    inv.query(Selector::All)
}
