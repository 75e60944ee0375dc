//! String-argument invocation.
//!
//! Ledger platforms invoke chaincode by function name with a list of string
//! arguments. [`invoke`] parses those arguments into the typed operations of
//! [`Contract`] and returns the result as JSON. Unknown names, wrong arity and
//! unparseable arguments are validation errors.

use careledger_store::LedgerStore;
use careledger_types::{AuditAction, timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::audit::NewAuditEntry;
use crate::consent::GrantConsent;
use crate::context::TxContext;
use crate::contract::Contract;
use crate::error::{CoreError, Result};
use crate::records::NewRecord;

/// Every function name [`invoke`] accepts.
pub const OPERATIONS: &[&str] = &[
    "GetCallerIdentity",
    "GrantConsent",
    "RevokeConsent",
    "CheckConsent",
    "QueryConsentsByPatient",
    "QueryConsentsByDoctor",
    "QueryAllConsents",
    "CreateAuditLog",
    "QueryAuditLogsByActor",
    "QueryAuditLogsByAction",
    "QueryAuditLogsByRecord",
    "QueryAuditLogsByTimeRange",
    "GetAllAuditLogs",
    "GetAuditStatistics",
    "CreateEHRMetadata",
    "QueryEHR",
    "QueryEHRsByPatient",
    "ViewEHR",
];

pub fn invoke<S: LedgerStore>(
    contract: &mut Contract<S>,
    ctx: &TxContext,
    name: &str,
    args: &[&str],
) -> Result<Value> {
    debug!(tx = %ctx.tx_id(), function = %name, args = args.len(), "Dispatching");

    match name {
        "GetCallerIdentity" => {
            arity::<0>(name, args)?;
            to_json(&contract.caller_identity(ctx)?)
        }
        "GrantConsent" => {
            let [consent_id, patient_id, doctor_id, record_id, expiry_days] = arity(name, args)?;
            let request = GrantConsent::new(
                consent_id,
                patient_id,
                doctor_id,
                record_id,
                parse_expiry_days(expiry_days)?,
            );
            to_json(&contract.grant_consent(ctx, request)?)
        }
        "RevokeConsent" => {
            let [consent_id] = arity(name, args)?;
            to_json(&contract.revoke_consent(ctx, consent_id)?)
        }
        "CheckConsent" => {
            let [patient_id, doctor_id, record_id] = arity(name, args)?;
            to_json(&contract.check_consent(ctx, patient_id, doctor_id, record_id)?)
        }
        "QueryConsentsByPatient" => {
            let [patient_id] = arity(name, args)?;
            to_json(&contract.query_consents_by_patient(ctx, patient_id)?)
        }
        "QueryConsentsByDoctor" => {
            let [doctor_id] = arity(name, args)?;
            to_json(&contract.query_consents_by_doctor(ctx, doctor_id)?)
        }
        "QueryAllConsents" => {
            arity::<0>(name, args)?;
            to_json(&contract.query_all_consents(ctx)?)
        }
        "CreateAuditLog" => {
            let [action, actor_id, target_id, record_id, success, message] = arity(name, args)?;
            let new = NewAuditEntry::new(
                parse_action(action)?,
                actor_id,
                target_id,
                record_id,
                parse_bool("success", success)?,
                message,
            );
            to_json(&contract.create_audit_log(ctx, new)?)
        }
        "QueryAuditLogsByActor" => {
            let [actor_id] = arity(name, args)?;
            to_json(&contract.query_audit_logs_by_actor(ctx, actor_id)?)
        }
        "QueryAuditLogsByAction" => {
            let [action] = arity(name, args)?;
            to_json(&contract.query_audit_logs_by_action(ctx, parse_action(action)?)?)
        }
        "QueryAuditLogsByRecord" => {
            let [record_id] = arity(name, args)?;
            to_json(&contract.query_audit_logs_by_record(ctx, record_id)?)
        }
        "QueryAuditLogsByTimeRange" => {
            let [start, end] = arity(name, args)?;
            let (start, end) = (parse_time("startTime", start)?, parse_time("endTime", end)?);
            to_json(&contract.query_audit_logs_by_time_range(ctx, start, end)?)
        }
        "GetAllAuditLogs" => {
            arity::<0>(name, args)?;
            to_json(&contract.get_all_audit_logs(ctx)?)
        }
        "GetAuditStatistics" => {
            arity::<0>(name, args)?;
            to_json(&contract.audit_statistics(ctx)?)
        }
        "CreateEHRMetadata" => {
            let [
                record_id,
                patient_id,
                offchain_hash,
                encrypted_key_blob,
                record_type,
                checksum,
            ] = arity(name, args)?;
            let new = NewRecord {
                record_id: record_id.to_string(),
                patient_id: patient_id.to_string(),
                offchain_hash: offchain_hash.to_string(),
                encrypted_key_blob: encrypted_key_blob.to_string(),
                record_type: record_type.to_string(),
                checksum: checksum.to_string(),
            };
            to_json(&contract.create_record_metadata(ctx, new)?)
        }
        "QueryEHR" => {
            let [record_id] = arity(name, args)?;
            to_json(&contract.query_ehr(ctx, record_id)?)
        }
        "QueryEHRsByPatient" => {
            let [patient_id] = arity(name, args)?;
            to_json(&contract.query_ehrs_by_patient(ctx, patient_id)?)
        }
        "ViewEHR" => {
            let [record_id] = arity(name, args)?;
            to_json(&contract.view_record(ctx, record_id)?)
        }
        _ => Err(CoreError::validation(format!("unknown function {name:?}"))),
    }
}

fn arity<'a, const N: usize>(name: &str, args: &[&'a str]) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        CoreError::validation(format!(
            "{name} takes {N} argument(s), got {}",
            args.len()
        ))
    })
}

fn parse_expiry_days(raw: &str) -> Result<u32> {
    raw.trim().parse().map_err(|_| {
        CoreError::validation(format!(
            "expiryDays must be a non-negative integer, got {raw:?}"
        ))
    })
}

fn parse_action(raw: &str) -> Result<AuditAction> {
    raw.parse()
        .map_err(|err: careledger_types::ParseError| CoreError::validation(err.to_string()))
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(CoreError::validation(format!(
            "{field} must be true or false, got {raw:?}"
        ))),
    }
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    timestamp::parse(raw.trim()).map_err(|err| {
        CoreError::validation(format!("{field} {raw:?} is not an RFC 3339 timestamp: {err}"))
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::Credential;
    use careledger_store::InMemoryLedger;
    use careledger_types::Role;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test]
    fn arity_accepts_exact_count() {
        let [a, b] = arity::<2>("F", &["x", "y"]).unwrap();
        assert_eq!((a, b), ("x", "y"));
    }

    #[test_case(&[] ; "too few")]
    #[test_case(&["x", "y", "z"] ; "too many")]
    fn arity_rejects_other_counts(args: &[&str]) {
        let err = arity::<2>("F", args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test_case("30", Some(30))]
    #[test_case(" 7 ", Some(7))]
    #[test_case("-1", None)]
    #[test_case("thirty", None)]
    fn expiry_days_parsing(raw: &str, expected: Option<u32>) {
        assert_eq!(parse_expiry_days(raw).ok(), expected);
    }

    #[test]
    fn time_parsing_accepts_offsets() {
        let parsed = parse_time("startTime", "2026-03-01T14:00:00+02:00").unwrap();
        assert_eq!(timestamp::canonical(&parsed), "2026-03-01T12:00:00.000000000Z");
        assert!(parse_time("startTime", "yesterday").is_err());
    }

    #[test]
    fn operation_names_are_unique() {
        assert_eq!(OPERATIONS.len(), 18);
        let unique: std::collections::BTreeSet<_> = OPERATIONS.iter().collect();
        assert_eq!(unique.len(), OPERATIONS.len());
    }

    #[test]
    fn every_operation_name_reaches_its_handler() {
        let mut contract = Contract::new(InMemoryLedger::new());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let ctx = TxContext::new("tx-1", now, Credential::new("root").with_role(Role::Admin));
        let too_many = ["a"; 8];

        for name in OPERATIONS {
            let err = invoke(&mut contract, &ctx, name, &too_many).unwrap_err();
            let message = err.to_string();
            assert!(!message.contains("unknown function"), "{name}: {message}");
            assert!(message.contains(&format!("{name} takes")), "{name}: {message}");
        }

        let err = invoke(&mut contract, &ctx, "DeleteEverything", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown function"));
        assert!(contract.store().is_empty());
    }
}
