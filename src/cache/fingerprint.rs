//! Content addressing for cache keys.
//!
//! Fingerprints are 128-bit XXH3 digests rendered as 32 lowercase hex
//! characters. XXH3 is seedless here and defined byte-for-byte, so the same
//! input yields the same key on every platform and across restarts.

// Author: kelexine (https://github.com/kelexine)

use crate::error::Result;
use crate::models::Request;
use serde_json::Value;
use xxhash_rust::xxh3::xxh3_128;

/// Fingerprint of an outbound request payload.
pub fn fingerprint_request(request: &Request) -> Result<String> {
    let canonical = canonical_json(&serde_json::to_value(request)?)?;
    Ok(digest(canonical.as_bytes()))
}

/// Fingerprint of raw text, used to key embedding entries.
pub fn fingerprint_text(text: &str) -> String {
    digest(text.as_bytes())
}

/// Serialize with object keys in sorted order at every depth.
fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(xxh3_128(bytes).to_be_bytes())
}
