//! Tagged document codec.
//!
//! Every entity written to the ledger is a JSON object carrying a `docType`
//! discriminant. Decoding checks the tag before touching any other field, so
//! entities that share field names (`patientId`, `recordId`) can never be
//! mistaken for one another.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::EntityKind;

/// Field holding the entity discriminant in every persisted document.
pub const KIND_FIELD: &str = "docType";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Document has no docType tag")]
    MissingKind,

    #[error("Expected a {expected} document, found {found}")]
    KindMismatch { expected: EntityKind, found: String },
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// An entity that can be persisted as a tagged ledger document.
pub trait Document: Serialize + DeserializeOwned {
    const KIND: EntityKind;
}

/// Serializes `doc` as a tagged JSON object.
pub fn encode<T: Document>(doc: &T) -> Result<Vec<u8>> {
    let mut fields = match serde_json::to_value(doc)? {
        Value::Object(fields) => fields,
        _ => return Err(DocumentError::NotAnObject),
    };
    fields.insert(
        KIND_FIELD.to_string(),
        Value::String(T::KIND.as_str().to_string()),
    );
    Ok(serde_json::to_vec(&Value::Object(fields))?)
}

/// Decodes a tagged document, rejecting any other entity kind.
pub fn decode<T: Document>(bytes: &[u8]) -> Result<T> {
    let mut fields: Map<String, Value> = match serde_json::from_slice(bytes)? {
        Value::Object(fields) => fields,
        _ => return Err(DocumentError::NotAnObject),
    };

    match fields.remove(KIND_FIELD) {
        Some(Value::String(tag)) if tag == T::KIND.as_str() => {}
        Some(Value::String(tag)) => {
            return Err(DocumentError::KindMismatch {
                expected: T::KIND,
                found: tag,
            });
        }
        Some(other) => {
            return Err(DocumentError::KindMismatch {
                expected: T::KIND,
                found: other.to_string(),
            });
        }
        None => return Err(DocumentError::MissingKind),
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Reads the discriminant of an encoded document without decoding the rest.
pub fn kind_of(bytes: &[u8]) -> Option<EntityKind> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value.get(KIND_FIELD)?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConsentScopeEntry, RecordMetadata};
    use chrono::{TimeZone, Utc};

    fn metadata() -> RecordMetadata {
        RecordMetadata {
            record_id: "r1".into(),
            patient_id: "p1".into(),
            offchain_hash: "QmHash".into(),
            encrypted_key_blob: "a2V5".into(),
            record_type: "lab".into(),
            checksum: "abc123".into(),
            created_by: "p1".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn encoded_documents_carry_their_kind() {
        let bytes = encode(&metadata()).unwrap();
        assert_eq!(kind_of(&bytes), Some(EntityKind::Ehr));

        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["docType"], "ehr");
        assert_eq!(raw["patientId"], "p1");
    }

    #[test]
    fn decode_rejects_other_kinds() {
        let bytes = encode(&metadata()).unwrap();
        let result = decode::<ConsentScopeEntry>(&bytes);
        assert!(matches!(
            result,
            Err(DocumentError::KindMismatch { expected: EntityKind::ConsentScope, .. })
        ));
    }

    #[test]
    fn decode_rejects_untagged_payloads() {
        let result = decode::<RecordMetadata>(br#"{"recordId":"r1"}"#);
        assert!(matches!(result, Err(DocumentError::MissingKind)));

        let result = decode::<RecordMetadata>(b"[1,2,3]");
        assert!(matches!(result, Err(DocumentError::NotAnObject)));
    }
}
