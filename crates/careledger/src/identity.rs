//! Caller identity and role resolution.
//!
//! The execution platform verifies credentials before an invocation reaches
//! careledger. This module only reads what the platform hands over: an
//! identity string and named attributes of the caller's credential.

use std::collections::BTreeMap;

use careledger_types::Role;
use serde::Serialize;
use thiserror::Error;

use crate::context::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The platform produced no identity for this invocation.
    #[error("no verified caller identity")]
    Unavailable,

    /// The credential store could not be read.
    #[error("credential attribute {attribute:?} unreadable: {reason}")]
    AttributeUnreadable { attribute: String, reason: String },

    /// The role attribute holds a value outside the closed role set.
    #[error("credential attribute {attribute:?} holds unknown role {value:?}")]
    UnknownRole { attribute: String, value: String },
}

/// Verified-credential access supplied by the execution platform.
pub trait IdentityProvider {
    /// The caller's identity string.
    fn caller_id(&self) -> Result<String, IdentityError>;

    /// A named attribute of the caller's credential. Absence is `Ok(None)`.
    fn attribute(&self, name: &str) -> Result<Option<String>, IdentityError>;
}

/// An already-verified credential held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    id: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl Credential {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// A credential the platform could not attribute to anyone.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the `role` attribute.
    pub fn with_role(self, role: Role) -> Self {
        self.with_attribute("role", role.as_str())
    }
}

impl IdentityProvider for Credential {
    fn caller_id(&self) -> Result<String, IdentityError> {
        self.id.clone().ok_or(IdentityError::Unavailable)
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.attributes.get(name).cloned())
    }
}

/// A resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub caller_id: String,
    pub role: Role,
}

/// Resolves the caller's identity string.
///
/// A blank identity is treated the same as a missing one.
pub fn resolve_caller_id(provider: &dyn IdentityProvider) -> Result<String, IdentityError> {
    let caller_id = provider.caller_id()?;
    if caller_id.trim().is_empty() {
        return Err(IdentityError::Unavailable);
    }
    Ok(caller_id)
}

/// Resolves the caller's role from the configured credential attribute.
///
/// A credential without the attribute gets the configured default role.
pub fn resolve_caller_role(
    provider: &dyn IdentityProvider,
    settings: &Settings,
) -> Result<Role, IdentityError> {
    match provider.attribute(&settings.role_attribute)? {
        None => Ok(settings.default_role),
        Some(value) => value.parse().map_err(|_| IdentityError::UnknownRole {
            attribute: settings.role_attribute.clone(),
            value,
        }),
    }
}

pub fn resolve_caller(
    provider: &dyn IdentityProvider,
    settings: &Settings,
) -> Result<Identity, IdentityError> {
    Ok(Identity {
        caller_id: resolve_caller_id(provider)?,
        role: resolve_caller_role(provider, settings)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn missing_role_attribute_defaults_to_patient() {
        let settings = Settings::default();
        let role = resolve_caller_role(&Credential::new("p1"), &settings).unwrap();
        assert_eq!(role, Role::Patient);
    }

    #[test_case("doctor", Role::Doctor)]
    #[test_case("ADMIN", Role::Admin)]
    #[test_case("patient", Role::Patient)]
    fn role_attribute_is_parsed(value: &str, expected: Role) {
        let credential = Credential::new("u1").with_attribute("role", value);
        let role = resolve_caller_role(&credential, &Settings::default()).unwrap();
        assert_eq!(role, expected);
    }

    #[test]
    fn unknown_role_is_an_identity_error() {
        let credential = Credential::new("u1").with_attribute("role", "nurse");
        let err = resolve_caller_role(&credential, &Settings::default()).unwrap_err();
        assert_eq!(
            err,
            IdentityError::UnknownRole {
                attribute: "role".into(),
                value: "nurse".into(),
            }
        );
    }

    #[test]
    fn role_attribute_name_is_configurable() {
        let settings = Settings {
            role_attribute: "hf.role".into(),
            ..Settings::default()
        };
        let credential = Credential::new("d1")
            .with_attribute("hf.role", "doctor")
            .with_role(Role::Admin);
        assert_eq!(resolve_caller_role(&credential, &settings).unwrap(), Role::Doctor);
    }

    #[test]
    fn anonymous_and_blank_callers_are_unavailable() {
        assert_eq!(
            resolve_caller_id(&Credential::anonymous()),
            Err(IdentityError::Unavailable)
        );
        assert_eq!(
            resolve_caller_id(&Credential::new("  ")),
            Err(IdentityError::Unavailable)
        );
    }
}
