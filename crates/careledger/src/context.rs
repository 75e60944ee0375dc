//! Per-invocation execution context and core settings.

use std::fmt;

use careledger_config::CareledgerConfig;
use careledger_types::Role;
use chrono::{DateTime, Utc};

use crate::identity::IdentityProvider;

/// Settings the core reads on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Credential attribute holding the caller's role.
    pub role_attribute: String,
    /// Role of callers whose credential has no role attribute.
    pub default_role: Role,
    /// Upper bound on `expiryDays` for a consent grant.
    pub max_expiry_days: u32,
    /// Composite-key object type of audit entries.
    pub audit_namespace: String,
}

impl Settings {
    pub fn from_config(config: &CareledgerConfig) -> Self {
        Self {
            role_attribute: config.identity.role_attribute.clone(),
            default_role: config.identity.default_role,
            max_expiry_days: config.consent.max_expiry_days,
            audit_namespace: config.audit.namespace.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&CareledgerConfig::default())
    }
}

impl From<&CareledgerConfig> for Settings {
    fn from(config: &CareledgerConfig) -> Self {
        Self::from_config(config)
    }
}

/// What the execution platform supplies once per invocation.
///
/// The timestamp is the single authoritative clock for the invocation: every
/// expiry computation and comparison uses it, never the host's wall clock.
/// Transaction ids must be unique across the ledger; audit log ids are
/// derived from them.
pub struct TxContext {
    tx_id: String,
    timestamp: DateTime<Utc>,
    identity: Box<dyn IdentityProvider>,
    client_address: Option<String>,
}

impl TxContext {
    pub fn new(
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        identity: impl IdentityProvider + 'static,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp,
            identity: Box::new(identity),
            client_address: None,
        }
    }

    /// Records the client's network address on audit entries.
    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    pub fn client_address(&self) -> Option<&str> {
        self.client_address.as_deref()
    }
}

impl fmt::Debug for TxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("tx_id", &self.tx_id)
            .field("timestamp", &self.timestamp)
            .field("client_address", &self.client_address)
            .finish_non_exhaustive()
    }
}
