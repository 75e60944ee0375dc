//! # careledger: consent, access control and audit for shared health records
//!
//! Patients own records, doctors request access, an admin oversees the
//! whole, and every privileged action leaves an audit entry. careledger is
//! the authorization and provenance core of that platform; it runs on top of
//! a replicated key-value ledger ([`careledger_store::LedgerStore`]) that
//! provides consensus, persistence and query indexing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  dispatch::invoke  (function name + string arguments)    │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Contract   submit: commit on success / evaluate: read   │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼  one Invocation per request
//! ┌──────────────┬──────────────┬─────────────┬──────────────┐
//! │ guard        │ consent      │ records     │ audit        │
//! │ proofs       │ grants,      │ insert-only │ append-only, │
//! │              │ scope index  │ metadata    │ multi-index  │
//! └──────┬───────┴──────┬───────┴──────┬──────┴──────┬───────┘
//!        ▼              ▼              ▼             ▼
//!   identity       Invocation: TxContext clock + Transaction
//! ```
//!
//! ## Guarantees
//!
//! - **One clock**: every expiry is computed and compared against the
//!   invocation's [`TxContext::timestamp`], never the host clock.
//! - **Atomic audit**: a primary write and its audit entry share one write
//!   set and commit together.
//! - **Non-bypassable guards**: mutating operations take proof values that
//!   only the [`guard`] functions can produce.
//! - **Tagged documents**: every persisted entity carries a `docType`
//!   discriminant and is decoded by tag.
//!
//! ## Example
//!
//! ```
//! use careledger::{Contract, Credential, GrantConsent, TxContext};
//! use careledger_store::InMemoryLedger;
//! use careledger_types::Role;
//! use chrono::{TimeZone, Utc};
//!
//! let mut contract = Contract::new(InMemoryLedger::new());
//! let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
//!
//! let patient = TxContext::new("tx-1", now, Credential::new("p1").with_role(Role::Patient));
//! contract
//!     .grant_consent(&patient, GrantConsent::new("consent123", "p1", "d1", "r1", 30))
//!     .unwrap();
//!
//! let doctor = TxContext::new("tx-2", now, Credential::new("d1").with_role(Role::Doctor));
//! assert!(contract.check_consent(&doctor, "p1", "d1", "r1").unwrap());
//! ```

pub mod audit;
pub mod consent;
pub mod context;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod identity;
pub mod invocation;
pub mod records;

pub use audit::{AuditStatistics, NewAuditEntry, sort_chronologically};
pub use consent::{GrantConsent, consent_scope_key};
pub use context::{Settings, TxContext};
pub use contract::Contract;
pub use error::{CoreError, ErrorKind, Result};
pub use guard::{Denial, DoctorWithConsent, PatientOrAdmin, RoleProof};
pub use identity::{Credential, Identity, IdentityError, IdentityProvider};
pub use invocation::Invocation;
pub use records::NewRecord;
