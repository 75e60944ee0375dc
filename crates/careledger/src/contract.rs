//! The operation surface.
//!
//! [`Contract`] owns the ledger handle and the settings. Each mutating
//! operation runs as one [`Invocation`] whose write set is committed only if
//! the operation succeeds; read-only operations never commit.
//!
//! A guarded mutation refused with an authorization error still leaves a
//! trace: a stand-alone `success=false` audit entry is committed before the
//! error is returned. No other failure writes anything.

use careledger_store::LedgerStore;
use careledger_types::{AuditAction, AuditEntry, ConsentGrant, RecordMetadata, Role};
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::audit::{self, AuditStatistics, NewAuditEntry};
use crate::consent::{self, GrantConsent};
use crate::context::{Settings, TxContext};
use crate::error::{CoreError, Result};
use crate::guard::{self, Denial};
use crate::identity::Identity;
use crate::invocation::Invocation;
use crate::records::{self, NewRecord};

pub struct Contract<S: LedgerStore> {
    store: S,
    settings: Settings,
}

/// What a guarded mutation was aimed at, for auditing a denial.
struct Attempt {
    action: AuditAction,
    target_id: String,
    record_id: String,
}

impl<S: LedgerStore> Contract<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs `op` and commits its writes if it succeeds.
    pub fn submit<T>(
        &mut self,
        ctx: &TxContext,
        op: impl FnOnce(&mut Invocation<'_, S>) -> Result<T>,
    ) -> Result<T> {
        let mut inv = Invocation::new(&self.store, ctx, &self.settings);
        let value = op(&mut inv)?;
        let writes = inv.into_write_set();
        let count = writes.len();

        if !writes.is_empty() {
            self.store.commit(writes).inspect_err(|err| {
                error!(tx = %ctx.tx_id(), error = %err, "Commit rejected");
            })?;
        }
        debug!(tx = %ctx.tx_id(), writes = count, "Invocation committed");
        Ok(value)
    }

    /// Runs a read-only `op`.
    pub fn evaluate<T>(
        &self,
        ctx: &TxContext,
        op: impl FnOnce(&Invocation<'_, S>) -> Result<T>,
    ) -> Result<T> {
        let inv = Invocation::new(&self.store, ctx, &self.settings);
        op(&inv)
    }

    fn submit_guarded<T>(
        &mut self,
        ctx: &TxContext,
        attempt: Attempt,
        op: impl FnOnce(&mut Invocation<'_, S>) -> Result<T>,
    ) -> Result<T> {
        match self.submit(ctx, op) {
            Err(CoreError::Authorization(denial)) => {
                self.audit_denial(ctx, attempt, &denial);
                Err(CoreError::Authorization(denial))
            }
            other => other,
        }
    }

    fn audit_denial(&mut self, ctx: &TxContext, attempt: Attempt, denial: &Denial) {
        let action = attempt.action;
        let result = self.submit(ctx, |inv| {
            let actor_id = inv.caller_id()?;
            audit::append(
                inv,
                NewAuditEntry::failure(
                    attempt.action,
                    actor_id,
                    attempt.target_id,
                    attempt.record_id,
                    denial.to_string(),
                ),
            )
        });
        if let Err(err) = result {
            error!(tx = %ctx.tx_id(), action = %action, error = %err, "Failed to audit denied attempt");
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn caller_identity(&self, ctx: &TxContext) -> Result<Identity> {
        self.evaluate(ctx, |inv| inv.caller())
    }

    // ========================================================================
    // Consent
    // ========================================================================

    pub fn grant_consent(&mut self, ctx: &TxContext, request: GrantConsent) -> Result<ConsentGrant> {
        let attempt = Attempt {
            action: AuditAction::GrantConsent,
            target_id: request.doctor_id.clone(),
            record_id: request.scope().as_record_id().to_string(),
        };
        self.submit_guarded(ctx, attempt, |inv| {
            request.validate(inv.settings())?;
            let proof = guard::require_patient_or_admin(inv, &request.patient_id)?;
            consent::grant_consent(inv, &proof, request)
        })
    }

    pub fn revoke_consent(&mut self, ctx: &TxContext, consent_id: &str) -> Result<ConsentGrant> {
        let stored = self.evaluate(ctx, |inv| consent::get_consent(inv, consent_id))?;
        let attempt = Attempt {
            action: AuditAction::RevokeConsent,
            target_id: stored.doctor_id.clone(),
            record_id: stored.record_id.clone(),
        };
        self.submit_guarded(ctx, attempt, |inv| {
            let proof = guard::require_patient_or_admin(inv, &stored.patient_id)?;
            consent::revoke_consent(inv, &proof, consent_id)
        })
    }

    pub fn check_consent(
        &self,
        ctx: &TxContext,
        patient_id: &str,
        doctor_id: &str,
        record_id: &str,
    ) -> Result<bool> {
        self.evaluate(ctx, |inv| {
            consent::check_consent(inv, patient_id, doctor_id, record_id)
        })
    }

    pub fn query_consents_by_patient(
        &self,
        ctx: &TxContext,
        patient_id: &str,
    ) -> Result<Vec<ConsentGrant>> {
        self.evaluate(ctx, |inv| consent::query_consents_by_patient(inv, patient_id))
    }

    pub fn query_consents_by_doctor(
        &self,
        ctx: &TxContext,
        doctor_id: &str,
    ) -> Result<Vec<ConsentGrant>> {
        self.evaluate(ctx, |inv| consent::query_consents_by_doctor(inv, doctor_id))
    }

    pub fn query_all_consents(&self, ctx: &TxContext) -> Result<Vec<ConsentGrant>> {
        self.evaluate(ctx, |inv| {
            let proof = guard::require_role(inv, Role::Admin)?;
            consent::query_all_consents(inv, &proof)
        })
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub fn create_audit_log(&mut self, ctx: &TxContext, new: NewAuditEntry) -> Result<AuditEntry> {
        self.submit(ctx, |inv| {
            let proof = guard::require_any_role(inv, &Role::ALL)?;
            audit::create_audit_log(inv, &proof, new)
        })
    }

    pub fn query_audit_logs_by_actor(
        &self,
        ctx: &TxContext,
        actor_id: &str,
    ) -> Result<Vec<AuditEntry>> {
        self.evaluate(ctx, |inv| audit::query_audit_logs_by_actor(inv, actor_id))
    }

    pub fn query_audit_logs_by_action(
        &self,
        ctx: &TxContext,
        action: AuditAction,
    ) -> Result<Vec<AuditEntry>> {
        self.evaluate(ctx, |inv| audit::query_audit_logs_by_action(inv, action))
    }

    pub fn query_audit_logs_by_record(
        &self,
        ctx: &TxContext,
        record_id: &str,
    ) -> Result<Vec<AuditEntry>> {
        self.evaluate(ctx, |inv| audit::query_audit_logs_by_record(inv, record_id))
    }

    pub fn query_audit_logs_by_time_range(
        &self,
        ctx: &TxContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>> {
        self.evaluate(ctx, |inv| {
            audit::query_audit_logs_by_time_range(inv, start, end)
        })
    }

    pub fn get_all_audit_logs(&self, ctx: &TxContext) -> Result<Vec<AuditEntry>> {
        self.evaluate(ctx, |inv| {
            let proof = guard::require_role(inv, Role::Admin)?;
            audit::get_all_audit_logs(inv, &proof)
        })
    }

    pub fn audit_statistics(&self, ctx: &TxContext) -> Result<AuditStatistics> {
        self.evaluate(ctx, |inv| {
            let proof = guard::require_role(inv, Role::Admin)?;
            audit::audit_statistics(inv, &proof)
        })
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn create_record_metadata(
        &mut self,
        ctx: &TxContext,
        new: NewRecord,
    ) -> Result<RecordMetadata> {
        let attempt = Attempt {
            action: AuditAction::CreateEhr,
            target_id: new.patient_id.clone(),
            record_id: new.record_id.clone(),
        };
        self.submit_guarded(ctx, attempt, |inv| {
            new.validate()?;
            records::ensure_absent(inv, &new.record_id)?;
            let proof = guard::require_patient_or_admin(inv, &new.patient_id)?;
            records::create_record_metadata(inv, &proof, new)
        })
    }

    pub fn query_ehr(&self, ctx: &TxContext, record_id: &str) -> Result<RecordMetadata> {
        self.evaluate(ctx, |inv| records::query_ehr(inv, record_id))
    }

    pub fn query_ehrs_by_patient(
        &self,
        ctx: &TxContext,
        patient_id: &str,
    ) -> Result<Vec<RecordMetadata>> {
        self.evaluate(ctx, |inv| records::query_ehrs_by_patient(inv, patient_id))
    }

    /// Doctor access path: consent-checked read that leaves a `VIEW_EHR` entry.
    pub fn view_record(&mut self, ctx: &TxContext, record_id: &str) -> Result<RecordMetadata> {
        let stored = self.query_ehr(ctx, record_id)?;
        let attempt = Attempt {
            action: AuditAction::ViewEhr,
            target_id: stored.patient_id.clone(),
            record_id: stored.record_id.clone(),
        };
        self.submit_guarded(ctx, attempt, |inv| {
            let proof =
                guard::require_doctor_with_consent(inv, &stored.patient_id, &stored.record_id)?;
            records::view_record(inv, &proof)
        })
    }
}
