//! Canonical JSON and SHA-256 digests.
//!
//! Object keys are sorted recursively and the value is serialised compactly
//! before hashing, so logically equal documents hash equally.

use sha2::{Digest, Sha256};

use crate::domain::error::Result;
use crate::domain::row::DatasetRow;

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();

            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with recursively sorted keys.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn compute_digest(value: &serde_json::Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Digest of an ordered dataset snapshot. Row order is part of the digest.
pub fn dataset_digest(rows: &[DatasetRow]) -> Result<String> {
    compute_digest(&serde_json::to_value(rows)?)
}
