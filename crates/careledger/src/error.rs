//! Error taxonomy shared by every operation.

use careledger_store::StoreError;
use careledger_types::DocumentError;
use std::fmt::{self, Display};
use thiserror::Error;

use crate::guard::Denial;
use crate::identity::IdentityError;

/// Error returned by every careledger operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed arguments.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The addressed entity does not exist.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    /// An insert-only entity is already present.
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    /// A role, ownership or consent check failed.
    #[error("Unauthorized: {0}")]
    Authorization(#[from] Denial),

    /// The ledger or the document codec failed.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The caller's credential could not be resolved.
    #[error("Identity unavailable: {0}")]
    Identity(#[from] IdentityError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Stable discriminant of a [`CoreError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Authorization,
    Persistence,
    Identity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::AlreadyExists => "AlreadyExistsError",
            ErrorKind::Authorization => "AuthorizationError",
            ErrorKind::Persistence => "PersistenceError",
            ErrorKind::Identity => "IdentityError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CoreError::Authorization(_) => ErrorKind::Authorization,
            CoreError::Persistence(_) => ErrorKind::Persistence,
            CoreError::Identity(_) => ErrorKind::Identity,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The denial carried by an authorization failure.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            CoreError::Authorization(denial) => Some(denial),
            _ => None,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            // Key parts come straight from caller arguments
            StoreError::InvalidKey(reason) => CoreError::Validation(reason),
            other => CoreError::Persistence(other.to_string()),
        }
    }
}

impl From<DocumentError> for CoreError {
    fn from(err: DocumentError) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let invalid: CoreError = StoreError::InvalidKey("nul".into()).into();
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        let rejected: CoreError = StoreError::WriteRejected {
            key: "k".into(),
            reason: "read-only".into(),
        }
        .into();
        assert_eq!(rejected.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = CoreError::not_found("consent", "consent123");
        assert_eq!(err.to_string(), "consent consent123 does not exist");
        assert_eq!(err.kind().to_string(), "NotFoundError");
    }
}
