//! Content hashing
//!
//! Decisions, overrides, proposals and replay reports are identified by
//! SHA-256 digests over a canonical JSON serialization: object keys are
//! sorted recursively so the digest never depends on map iteration order
//! or struct field order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HashError {
    #[error("Canonical serialization failed: {0}")]
    Serialization(String),
}

/// Lowercase hex SHA-256 of raw bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Recursively sort all object keys
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Canonical JSON text for any serializable value
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, HashError> {
    let value = serde_json::to_value(value).map_err(|e| HashError::Serialization(e.to_string()))?;
    serde_json::to_string(&canonicalize(value)).map_err(|e| HashError::Serialization(e.to_string()))
}

/// Deterministic SHA-256 hash of any serializable value
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String, HashError> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}
