//! Shared fixtures for careledger integration tests.

#![allow(dead_code)]

use careledger::{Contract, Credential, GrantConsent, NewRecord, Settings, TxContext};
use careledger_store::InMemoryLedger;
use careledger_types::{AuditEntry, ConsentGrant, Role};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// A contract over an in-memory ledger with a controllable clock.
///
/// Every context gets a fresh transaction id, as distinct ledger
/// transactions would.
pub struct Ledger {
    pub contract: Contract<InMemoryLedger>,
    pub now: DateTime<Utc>,
    next_tx: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            contract: Contract::new(InMemoryLedger::new()).with_settings(settings),
            now: epoch(),
            next_tx: 0,
        }
    }

    pub fn as_caller(&mut self, caller: &str, role: Role) -> TxContext {
        self.next_tx += 1;
        TxContext::new(
            format!("tx-{:04}", self.next_tx),
            self.now,
            Credential::new(caller).with_role(role),
        )
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn grant(
        &mut self,
        consent_id: &str,
        patient: &str,
        doctor: &str,
        record: &str,
        days: u32,
    ) -> careledger::Result<ConsentGrant> {
        let ctx = self.as_caller(patient, Role::Patient);
        self.contract
            .grant_consent(&ctx, GrantConsent::new(consent_id, patient, doctor, record, days))
    }

    pub fn check(&mut self, patient: &str, doctor: &str, record: &str) -> bool {
        let ctx = self.as_caller(doctor, Role::Doctor);
        self.contract
            .check_consent(&ctx, patient, doctor, record)
            .expect("check_consent is infallible for valid ids")
    }

    pub fn create_record(&mut self, record: &str, patient: &str) -> careledger::Result<()> {
        let ctx = self.as_caller(patient, Role::Patient);
        self.contract
            .create_record_metadata(&ctx, record_for(record, patient))
            .map(|_| ())
    }

    pub fn audit_trail(&mut self) -> Vec<AuditEntry> {
        let ctx = self.as_caller("admin", Role::Admin);
        let mut entries = self
            .contract
            .get_all_audit_logs(&ctx)
            .expect("admin can read the trail");
        careledger::sort_chronologically(&mut entries);
        entries
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn record_for(record_id: &str, patient_id: &str) -> NewRecord {
    NewRecord {
        record_id: record_id.to_string(),
        patient_id: patient_id.to_string(),
        offchain_hash: format!("QmHash{record_id}"),
        encrypted_key_blob: "wrapped-dek".to_string(),
        record_type: "imaging".to_string(),
        checksum: "sha256:ab12".to_string(),
    }
}
