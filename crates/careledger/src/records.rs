//! Record metadata: insert-only pointers to encrypted off-chain documents.

use careledger_store::{LedgerStore, Selector, composite_key};
use careledger_types::{AuditAction, RecordMetadata};
use tracing::info;

use crate::audit::{self, NewAuditEntry};
use crate::error::{CoreError, Result};
use crate::guard::{Denial, DoctorWithConsent, PatientOrAdmin};
use crate::invocation::Invocation;

pub const RECORD_NAMESPACE: &str = "ehr";

/// Arguments of a record metadata creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub record_id: String,
    pub patient_id: String,
    pub offchain_hash: String,
    pub encrypted_key_blob: String,
    pub record_type: String,
    pub checksum: String,
}

impl NewRecord {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("recordId", &self.record_id),
            ("patientId", &self.patient_id),
            ("offchainHash", &self.offchain_hash),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

fn record_key(record_id: &str) -> Result<String> {
    Ok(composite_key(RECORD_NAMESPACE, &[record_id])?)
}

/// Fails with `AlreadyExists` if `record_id` is taken.
pub fn ensure_absent<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    record_id: &str,
) -> Result<()> {
    if inv.exists(&record_key(record_id)?)? {
        return Err(CoreError::AlreadyExists {
            entity: "record",
            id: record_id.to_string(),
        });
    }
    Ok(())
}

/// Writes new record metadata and emits `CREATE_EHR`.
pub fn create_record_metadata<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    proof: &PatientOrAdmin,
    new: NewRecord,
) -> Result<RecordMetadata> {
    new.validate()?;
    ensure_absent(inv, &new.record_id)?;
    proof.ensure_covers(&new.patient_id)?;

    let metadata = RecordMetadata {
        record_id: new.record_id,
        patient_id: new.patient_id,
        offchain_hash: new.offchain_hash,
        encrypted_key_blob: new.encrypted_key_blob,
        record_type: new.record_type,
        checksum: new.checksum,
        created_by: proof.caller_id().to_string(),
        timestamp: inv.now(),
    };
    inv.save(record_key(&metadata.record_id)?, &metadata)?;

    audit::append(
        inv,
        NewAuditEntry::success(
            AuditAction::CreateEhr,
            proof.caller_id(),
            &metadata.patient_id,
            &metadata.record_id,
            "EHR metadata created",
        ),
    )?;

    info!(
        record = %metadata.record_id,
        patient = %metadata.patient_id,
        record_type = %metadata.record_type,
        "Record metadata created"
    );
    Ok(metadata)
}

pub fn query_ehr<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    record_id: &str,
) -> Result<RecordMetadata> {
    inv.load(&record_key(record_id)?)?
        .ok_or_else(|| CoreError::not_found("record", record_id))
}

pub fn query_ehrs_by_patient<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
) -> Result<Vec<RecordMetadata>> {
    inv.query(Selector::equals("patientId", patient_id))
}

/// Returns the metadata a consenting doctor asked for and emits `VIEW_EHR`.
pub fn view_record<S: LedgerStore + ?Sized>(
    inv: &mut Invocation<'_, S>,
    proof: &DoctorWithConsent,
) -> Result<RecordMetadata> {
    let metadata = query_ehr(inv, proof.record_id())?;
    if metadata.patient_id != proof.patient_id() {
        return Err(CoreError::Authorization(Denial::NoConsent {
            patient_id: metadata.patient_id,
            doctor_id: proof.doctor_id().to_string(),
            record_id: metadata.record_id,
        }));
    }

    audit::append(
        inv,
        NewAuditEntry::success(
            AuditAction::ViewEhr,
            proof.doctor_id(),
            &metadata.patient_id,
            &metadata.record_id,
            "EHR metadata viewed under consent",
        ),
    )?;

    info!(
        record = %metadata.record_id,
        doctor = %proof.doctor_id(),
        "Record metadata viewed"
    );
    Ok(metadata)
}
