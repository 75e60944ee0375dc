//! Composite keys.
//!
//! A composite key is `\0<type>\0<attr1>\0<attr2>\0...`. The leading NUL
//! keeps composite keys out of the simple-key namespace, and because every
//! attribute is terminated, the key for a prefix of the attributes is a byte
//! prefix of the full key. That is what makes partial-key range scans work.

use crate::{Result, StoreError};

const DELIMITER: char = '\u{0}';

/// Builds the key for `object_type` with every attribute supplied.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] if the object type is empty or any
/// part contains the delimiter.
pub fn composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    partial_key(object_type, attributes)
}

/// Builds the scan prefix for all keys of `object_type` whose leading
/// attributes equal `attributes`.
pub fn partial_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    if object_type.is_empty() {
        return Err(StoreError::InvalidKey(
            "composite key object type must not be empty".to_string(),
        ));
    }
    validate_part(object_type)?;

    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(DELIMITER);
    key.push_str(object_type);
    key.push(DELIMITER);
    for attribute in attributes {
        validate_part(attribute)?;
        key.push_str(attribute);
        key.push(DELIMITER);
    }
    Ok(key)
}

/// Splits a composite key back into its object type and attributes.
///
/// Returns `None` for keys that are not composite keys.
pub fn split_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let body = key.strip_prefix(DELIMITER)?.strip_suffix(DELIMITER)?;
    let mut parts = body.split(DELIMITER);
    let object_type = parts.next().filter(|t| !t.is_empty())?;
    Some((object_type, parts.collect()))
}

fn validate_part(part: &str) -> Result<()> {
    if part.contains(DELIMITER) {
        return Err(StoreError::InvalidKey(format!(
            "key part {part:?} contains a NUL byte"
        )));
    }
    Ok(())
}
