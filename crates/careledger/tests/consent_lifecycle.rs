//! Integration tests for the consent lifecycle.
//!
//! Grants, expiry against the invocation clock, revocation and the
//! specific/wildcard lookup order, driven through [`careledger::Contract`].

mod common;

use careledger::ErrorKind;
use careledger_store::{LedgerStore, partial_key};
use careledger_types::Role;
use chrono::Duration;
use common::Ledger;

// ============================================================================
// Grant and Expiry
// ============================================================================

#[test]
fn grant_expires_and_regrant_restores_access() {
    let mut ledger = Ledger::new();

    ledger.grant("consent123", "p1", "d1", "r1", 30).unwrap();
    assert!(ledger.check("p1", "d1", "r1"));

    ledger.advance(Duration::days(31));
    assert!(!ledger.check("p1", "d1", "r1"));

    ledger.grant("consent123", "p1", "d1", "r1", 30).unwrap();
    assert!(ledger.check("p1", "d1", "r1"));
}

#[test]
fn grant_is_inactive_exactly_at_expiry() {
    let mut ledger = Ledger::new();
    ledger.grant("c1", "p1", "d1", "r1", 1).unwrap();

    ledger.advance(Duration::days(1) - Duration::seconds(1));
    assert!(ledger.check("p1", "d1", "r1"));

    ledger.advance(Duration::seconds(1));
    assert!(!ledger.check("p1", "d1", "r1"));
}

#[test]
fn wildcard_grant_covers_records_without_a_specific_grant() {
    let mut ledger = Ledger::new();
    let grant = ledger.grant("consent456", "p1", "d1", "", 10).unwrap();
    assert_eq!(grant.record_id, "*");

    assert!(ledger.check("p1", "d1", "r9"));
    assert!(ledger.check("p1", "d1", "*"));
    assert!(!ledger.check("p1", "d2", "r9"));
    assert!(!ledger.check("p2", "d1", "r9"));
}

#[test]
fn specific_grant_takes_precedence_over_wildcard() {
    let mut ledger = Ledger::new();
    ledger.grant("wide", "p1", "d1", "*", 30).unwrap();
    ledger.grant("narrow", "p1", "d1", "r1", 1).unwrap();

    ledger.advance(Duration::days(2));

    // The expired specific grant answers for r1 on its own
    assert!(!ledger.check("p1", "d1", "r1"));
    assert!(ledger.check("p1", "d1", "r2"));
}

#[test]
fn grant_stamps_issue_and_expiry_from_the_invocation_clock() {
    let mut ledger = Ledger::new();
    ledger.advance(Duration::hours(5));
    let grant = ledger.grant("c1", "p1", "d1", "r1", 7).unwrap();

    assert_eq!(grant.issued_at, ledger.now);
    assert_eq!(grant.expiry_at, ledger.now + Duration::days(7));
    assert!(grant.granted);
    assert_eq!(grant.granted_by, "p1");
}

#[test]
fn patient_cannot_grant_for_another_patient() {
    let mut ledger = Ledger::new();
    let ctx = ledger.as_caller("p2", Role::Patient);
    let err = ledger
        .contract
        .grant_consent(
            &ctx,
            careledger::GrantConsent::new("c1", "p1", "d1", "r1", 30),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(!ledger.check("p1", "d1", "r1"));

    let ctx = ledger.as_caller("p1", Role::Patient);
    assert!(ledger.contract.query_consents_by_patient(&ctx, "p1").unwrap().is_empty());
}

// ============================================================================
// Revocation
// ============================================================================

#[test]
fn revoke_flips_granted_and_leaves_other_fields() {
    let mut ledger = Ledger::new();
    let original = ledger.grant("c1", "p1", "d1", "r1", 30).unwrap();
    ledger.advance(Duration::hours(2));

    let ctx = ledger.as_caller("p1", Role::Patient);
    let revoked = ledger.contract.revoke_consent(&ctx, "c1").unwrap();

    assert!(!revoked.granted);
    assert_eq!(revoked.issued_at, ledger.now);
    assert_eq!(revoked.consent_id, original.consent_id);
    assert_eq!(revoked.patient_id, original.patient_id);
    assert_eq!(revoked.doctor_id, original.doctor_id);
    assert_eq!(revoked.record_id, original.record_id);
    assert_eq!(revoked.expiry_at, original.expiry_at);
    assert_eq!(revoked.granted_by, original.granted_by);

    assert!(!ledger.check("p1", "d1", "r1"));

    let ctx = ledger.as_caller("p1", Role::Patient);
    let stored = ledger.contract.query_consents_by_patient(&ctx, "p1").unwrap();
    assert_eq!(stored, vec![revoked]);
}

#[test]
fn revoking_unknown_consent_mutates_nothing() {
    let mut ledger = Ledger::new();
    ledger.grant("c1", "p1", "d1", "r1", 30).unwrap();
    let entries = ledger.contract.store().len();
    let commits = ledger.contract.store().commit_count();

    let ctx = ledger.as_caller("p1", Role::Patient);
    let err = ledger.contract.revoke_consent(&ctx, "missing").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(ledger.contract.store().len(), entries);
    assert_eq!(ledger.contract.store().commit_count(), commits);
}

#[test]
fn only_owner_or_admin_may_revoke() {
    let mut ledger = Ledger::new();
    ledger.grant("c1", "p1", "d1", "r1", 30).unwrap();

    let doctor = ledger.as_caller("d1", Role::Doctor);
    let err = ledger.contract.revoke_consent(&doctor, "c1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(ledger.check("p1", "d1", "r1"));

    let admin = ledger.as_caller("root", Role::Admin);
    ledger.contract.revoke_consent(&admin, "c1").unwrap();
    assert!(!ledger.check("p1", "d1", "r1"));
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn audit_write_failure_rolls_back_the_grant() {
    let mut ledger = Ledger::new();
    let audit_prefix = partial_key("audit", &[]).unwrap();
    ledger.contract.store_mut().reject_writes_with_prefix(audit_prefix);

    let err = ledger.grant("c1", "p1", "d1", "r1", 30).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(ledger.contract.store().is_empty());
    assert_eq!(ledger.contract.store().commit_count(), 0);

    ledger.contract.store_mut().accept_all_writes();
    assert!(!ledger.check("p1", "d1", "r1"));
    ledger.grant("c1", "p1", "d1", "r1", 30).unwrap();
    assert!(ledger.check("p1", "d1", "r1"));
}

#[test]
fn grant_commits_consent_scope_index_and_audit_together() {
    let mut ledger = Ledger::new();
    ledger.grant("c1", "p1", "d1", "r1", 30).unwrap();

    let store = ledger.contract.store();
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.scan_prefix(&partial_key("consent", &[]).unwrap()).unwrap().len(), 1);
    assert_eq!(
        store
            .scan_prefix(&partial_key("consentScope", &["p1", "d1"]).unwrap())
            .unwrap()
            .len(),
        1
    );
    assert_eq!(store.scan_prefix(&partial_key("audit", &[]).unwrap()).unwrap().len(), 1);
}
