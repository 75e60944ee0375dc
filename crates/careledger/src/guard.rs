//! Access control guards.
//!
//! Each guard resolves the caller, decides, and on success returns a proof
//! value. Proofs have private fields and crate-private constructors, so the
//! only way to obtain one is to pass the guard. Every mutating operation takes
//! the proof it needs as an argument; calling it without the check does not
//! compile.
//!
//! Guards never write. Denials are logged at `warn`.

use careledger_store::LedgerStore;
use careledger_types::Role;
use thiserror::Error;
use tracing::{debug, warn};

use crate::consent;
use crate::error::{CoreError, Result};
use crate::identity::Identity;
use crate::invocation::Invocation;

/// Why a guard refused the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("requires role {required}, caller is {actual}")]
    WrongRole { required: Role, actual: Role },

    #[error("requires one of roles [{}], caller is {actual}", join_roles(.allowed))]
    NotAnyRole { allowed: Vec<Role>, actual: Role },

    #[error("caller {caller_id} must be patient {patient_id} or an admin")]
    NotPatientOrAdmin {
        caller_id: String,
        patient_id: String,
    },

    #[error("caller is {actual}, must be a doctor")]
    NotADoctor { actual: Role },

    #[error("doctor {doctor_id} has no valid consent from patient {patient_id} for record {record_id}")]
    NoConsent {
        patient_id: String,
        doctor_id: String,
        record_id: String,
    },
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Proofs
// ============================================================================

/// The caller holds a role accepted by [`require_role`] or [`require_any_role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleProof {
    caller: Identity,
}

impl RoleProof {
    pub fn caller_id(&self) -> &str {
        &self.caller.caller_id
    }

    pub fn role(&self) -> Role {
        self.caller.role
    }

    pub(crate) fn ensure(&self, required: Role) -> std::result::Result<(), Denial> {
        if self.caller.role == required {
            Ok(())
        } else {
            Err(Denial::WrongRole {
                required,
                actual: self.caller.role,
            })
        }
    }
}

/// The caller is the named patient, or an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientOrAdmin {
    caller: Identity,
    patient_id: String,
}

impl PatientOrAdmin {
    pub fn caller_id(&self) -> &str {
        &self.caller.caller_id
    }

    pub fn role(&self) -> Role {
        self.caller.role
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Admin proofs cover every patient; patient proofs only their own records.
    pub(crate) fn ensure_covers(&self, patient_id: &str) -> std::result::Result<(), Denial> {
        if self.caller.role == Role::Admin || self.patient_id == patient_id {
            Ok(())
        } else {
            Err(Denial::NotPatientOrAdmin {
                caller_id: self.caller.caller_id.clone(),
                patient_id: patient_id.to_string(),
            })
        }
    }
}

/// The caller is a doctor holding active consent for one patient record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorWithConsent {
    doctor_id: String,
    patient_id: String,
    record_id: String,
}

impl DoctorWithConsent {
    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }
}

// ============================================================================
// Guards
// ============================================================================

fn deny<T>(caller: &Identity, denial: Denial) -> Result<T> {
    warn!(
        caller = %caller.caller_id,
        role = %caller.role,
        reason = %denial,
        "Access denied"
    );
    Err(CoreError::Authorization(denial))
}

/// Caller role must equal `required`.
pub fn require_role<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    required: Role,
) -> Result<RoleProof> {
    let caller = inv.caller()?;
    if caller.role != required {
        let denial = Denial::WrongRole {
            required,
            actual: caller.role,
        };
        return deny(&caller, denial);
    }
    debug!(caller = %caller.caller_id, role = %caller.role, "Role check passed");
    Ok(RoleProof { caller })
}

/// Caller role must be one of `allowed`.
pub fn require_any_role<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    allowed: &[Role],
) -> Result<RoleProof> {
    let caller = inv.caller()?;
    if !allowed.contains(&caller.role) {
        let denial = Denial::NotAnyRole {
            allowed: allowed.to_vec(),
            actual: caller.role,
        };
        return deny(&caller, denial);
    }
    debug!(caller = %caller.caller_id, role = %caller.role, "Role check passed");
    Ok(RoleProof { caller })
}

/// Caller must be an admin, or be `patient_id` itself.
///
/// The caller identity string is compared directly with the patient key.
pub fn require_patient_or_admin<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
) -> Result<PatientOrAdmin> {
    let caller = inv.caller()?;
    if caller.role != Role::Admin && caller.caller_id != patient_id {
        let denial = Denial::NotPatientOrAdmin {
            caller_id: caller.caller_id.clone(),
            patient_id: patient_id.to_string(),
        };
        return deny(&caller, denial);
    }
    debug!(caller = %caller.caller_id, patient = %patient_id, "Ownership check passed");
    Ok(PatientOrAdmin {
        caller,
        patient_id: patient_id.to_string(),
    })
}

/// Caller must be a doctor with active consent for `patient_id`'s `record_id`.
pub fn require_doctor_with_consent<S: LedgerStore + ?Sized>(
    inv: &Invocation<'_, S>,
    patient_id: &str,
    record_id: &str,
) -> Result<DoctorWithConsent> {
    let caller = inv.caller()?;
    if caller.role != Role::Doctor {
        return deny(&caller, Denial::NotADoctor { actual: caller.role });
    }

    if !consent::check_consent(inv, patient_id, &caller.caller_id, record_id)? {
        let denial = Denial::NoConsent {
            patient_id: patient_id.to_string(),
            doctor_id: caller.caller_id.clone(),
            record_id: record_id.to_string(),
        };
        return deny(&caller, denial);
    }

    debug!(
        doctor = %caller.caller_id,
        patient = %patient_id,
        record = %record_id,
        "Consent check passed"
    );
    Ok(DoctorWithConsent {
        doctor_id: caller.caller_id,
        patient_id: patient_id.to_string(),
        record_id: record_id.to_string(),
    })
}
