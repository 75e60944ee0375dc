//! # careledger-types: Core types for careledger
//!
//! This crate contains the data model shared by the store and the core:
//! - Caller roles ([`Role`], [`ActorRole`])
//! - Audit vocabulary ([`AuditAction`], [`AuditEntry`])
//! - Consent grants ([`ConsentGrant`], [`ConsentScope`], [`ConsentScopeEntry`])
//! - Off-chain record pointers ([`RecordMetadata`])
//! - Persisted entity discriminants ([`EntityKind`]) and the tagged
//!   [`document`] codec
//! - The canonical [`timestamp`] encoding

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod document;
pub mod timestamp;

pub use document::{Document, DocumentError};

/// Record id that grants access to every record of a patient.
pub const WILDCARD_RECORD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value:?}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Role carried by a caller's verified credential.
///
/// The set is closed and flat: no role implies another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns records and grants consent over them.
    Patient,
    /// Reads patient records under a consent grant.
    Doctor,
    /// Oversees the platform, including the full audit trail.
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::new("role", s))
    }
}

/// Role recorded on an audit entry.
///
/// Audit writes never fail because the actor's role could not be resolved;
/// such entries are attributed to [`ActorRole::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
    Unknown,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Patient => "patient",
            ActorRole::Doctor => "doctor",
            ActorRole::Admin => "admin",
            ActorRole::Unknown => "unknown",
        }
    }
}

impl From<Role> for ActorRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Patient => ActorRole::Patient,
            Role::Doctor => ActorRole::Doctor,
            Role::Admin => ActorRole::Admin,
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entity kinds
// ============================================================================

/// Discriminant stored in the `docType` field of every persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Consent,
    ConsentScope,
    Ehr,
    Audit,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Consent => "consent",
            EntityKind::ConsentScope => "consentScope",
            EntityKind::Ehr => "ehr",
            EntityKind::Audit => "audit",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            EntityKind::Consent,
            EntityKind::ConsentScope,
            EntityKind::Ehr,
            EntityKind::Audit,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
        .ok_or_else(|| ParseError::new("entity kind", s))
    }
}

// ============================================================================
// Audit
// ============================================================================

/// Actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Record metadata was created.
    CreateEhr,
    /// A doctor viewed record metadata under consent.
    ViewEhr,
    /// A consent grant was written (new or replaced).
    GrantConsent,
    /// A consent grant was revoked.
    RevokeConsent,
    /// A consent check was logged by a caller.
    CheckConsent,
}

impl AuditAction {
    pub const ALL: [AuditAction; 5] = [
        AuditAction::CreateEhr,
        AuditAction::ViewEhr,
        AuditAction::GrantConsent,
        AuditAction::RevokeConsent,
        AuditAction::CheckConsent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateEhr => "CREATE_EHR",
            AuditAction::ViewEhr => "VIEW_EHR",
            AuditAction::GrantConsent => "GRANT_CONSENT",
            AuditAction::RevokeConsent => "REVOKE_CONSENT",
            AuditAction::CheckConsent => "CHECK_CONSENT",
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseError::new("audit action", s))
    }
}

/// A single audit trail entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Globally unique entry id.
    pub log_id: Uuid,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_role: ActorRole,
    /// The party the action was aimed at (doctor for consent, patient for records).
    pub target_id: String,
    pub record_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Client address, when the execution context supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub success: bool,
    pub message: String,
}

impl Document for AuditEntry {
    const KIND: EntityKind = EntityKind::Audit;
}

// ============================================================================
// Consent
// ============================================================================

/// What a consent grant covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConsentScope {
    /// A single record.
    Record(String),
    /// Every record owned by the patient.
    AllRecords,
}

impl ConsentScope {
    /// Interprets a caller-supplied record id; empty and `*` mean every record.
    pub fn from_record_id(record_id: &str) -> Self {
        if record_id.is_empty() || record_id == WILDCARD_RECORD {
            ConsentScope::AllRecords
        } else {
            ConsentScope::Record(record_id.to_string())
        }
    }

    /// The record id as persisted.
    pub fn as_record_id(&self) -> &str {
        match self {
            ConsentScope::Record(id) => id,
            ConsentScope::AllRecords => WILDCARD_RECORD,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ConsentScope::AllRecords)
    }
}

/// Time-bounded permission for a doctor to access a patient's record(s).
///
/// Revocation flips `granted` and refreshes `issued_at`; grants are never
/// deleted so their history stays on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentGrant {
    pub consent_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// A record id, or [`WILDCARD_RECORD`].
    pub record_id: String,
    pub granted: bool,
    #[serde(with = "timestamp")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub expiry_at: DateTime<Utc>,
    pub granted_by: String,
}

impl ConsentGrant {
    pub fn scope(&self) -> ConsentScope {
        ConsentScope::from_record_id(&self.record_id)
    }

    /// Whether the grant has passed its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_at
    }

    /// Whether the grant authorizes access at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.granted && !self.is_expired(now)
    }

    /// Marks the grant revoked. Expiry is left unchanged.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.granted = false;
        self.issued_at = now;
    }

    /// Whether this grant is the one answering for `patient|doctor|scope`.
    pub fn covers(&self, patient_id: &str, doctor_id: &str, scope: &ConsentScope) -> bool {
        self.patient_id == patient_id && self.doctor_id == doctor_id && &self.scope() == scope
    }
}

impl Document for ConsentGrant {
    const KIND: EntityKind = EntityKind::Consent;
}

/// Index entry pointing a `patient|doctor|scope` triple at a consent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentScopeEntry {
    pub scope_key: String,
    pub consent_id: String,
}

impl Document for ConsentScopeEntry {
    const KIND: EntityKind = EntityKind::ConsentScope;
}

// ============================================================================
// Record metadata
// ============================================================================

/// Pointer to an encrypted document held off-chain. Insert-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub record_id: String,
    pub patient_id: String,
    /// Content address of the encrypted payload in the off-chain store.
    pub offchain_hash: String,
    /// Document key, encrypted for the patient.
    pub encrypted_key_blob: String,
    pub record_type: String,
    pub checksum: String,
    pub created_by: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Document for RecordMetadata {
    const KIND: EntityKind = EntityKind::Ehr;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use test_case::test_case;

    fn grant(record_id: &str) -> ConsentGrant {
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        ConsentGrant {
            consent_id: "consent123".into(),
            patient_id: "p1".into(),
            doctor_id: "d1".into(),
            record_id: record_id.into(),
            granted: true,
            issued_at: issued,
            expiry_at: issued + Duration::days(30),
            granted_by: "p1".into(),
        }
    }

    #[test_case("patient", Role::Patient)]
    #[test_case("Doctor", Role::Doctor)]
    #[test_case(" ADMIN ", Role::Admin)]
    fn role_parses_case_insensitively(raw: &str, expected: Role) {
        assert_eq!(raw.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "nurse".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown role: \"nurse\"");
    }

    #[test]
    fn audit_action_wire_names() {
        for action in AuditAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
    }

    #[test_case("", true)]
    #[test_case("*", true)]
    #[test_case("r1", false)]
    fn scope_from_record_id(record_id: &str, wildcard: bool) {
        assert_eq!(ConsentScope::from_record_id(record_id).is_wildcard(), wildcard);
    }

    #[test]
    fn grant_expiry_is_exclusive() {
        let g = grant("r1");
        assert!(g.is_active(g.expiry_at - Duration::seconds(1)));
        assert!(!g.is_active(g.expiry_at));
        assert!(g.is_expired(g.expiry_at));
    }

    #[test]
    fn revoke_keeps_expiry_and_parties() {
        let mut g = grant("r1");
        let original = g.clone();
        let later = g.issued_at + Duration::days(2);

        g.revoke(later);

        assert!(!g.granted);
        assert_eq!(g.issued_at, later);
        assert_eq!(g.expiry_at, original.expiry_at);
        assert_eq!(g.patient_id, original.patient_id);
        assert_eq!(g.doctor_id, original.doctor_id);
        assert_eq!(g.record_id, original.record_id);
        assert!(!g.is_active(later));
    }

    #[test]
    fn covers_matches_parties_and_scope() {
        let specific = grant("r1");
        assert!(specific.covers("p1", "d1", &ConsentScope::Record("r1".into())));
        assert!(!specific.covers("p1", "d1", &ConsentScope::AllRecords));
        assert!(!specific.covers("p1", "d2", &ConsentScope::Record("r1".into())));

        let wildcard = grant("*");
        assert!(wildcard.covers("p1", "d1", &ConsentScope::AllRecords));
    }

    #[test]
    fn consent_grant_wire_format() {
        let json = serde_json::to_value(grant("*")).unwrap();
        assert_eq!(json["consentId"], "consent123");
        assert_eq!(json["recordId"], "*");
        assert_eq!(json["issuedAt"], "2026-03-01T12:00:00.000000000Z");
        assert_eq!(json["expiryAt"], "2026-03-31T12:00:00.000000000Z");
    }
}
