//! Hashing - selection seeds and catalog digests
//!
//! Two families live here: the 32-bit FNV-1a fold that turns a selection
//! signature into a seed, and SHA-256 over canonical JSON for catalog digests.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over the UTF-16 code units of `input`, not its UTF-8 bytes.
pub fn hash32(input: &str) -> u32 {
    input.encode_utf16().fold(FNV_OFFSET_BASIS, |h, unit| {
        (h ^ unit as u32).wrapping_mul(FNV_PRIME)
    })
}

/// Seed for a selection signature.
pub fn seed(signature: &str) -> u32 {
    hash32(signature)
}

/// 8-digit uppercase hex form shown to users (`SEED 0A1B2C3D`).
pub fn display_seed(seed: u32) -> String {
    format!("{:08X}", seed)
}

/// Cheap bounded display statistic in 60..=99.
pub fn stability(seed: u32) -> u32 {
    60 + (seed % 40)
}

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Digest of any serializable value, independent of field order.
pub fn compute_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash32_known_vectors() {
        // Standard FNV-1a 32-bit vectors.
        assert_eq!(hash32(""), 0x811c_9dc5);
        assert_eq!(hash32("a"), 0xe40c_292c);
        assert_eq!(hash32("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_seed_deterministic() {
        let sig = "large|head:S::h_0001.png|torso:S::t_0001.png|legs:none|feet:none";
        assert_eq!(seed(sig), seed(sig));
        assert_ne!(seed(sig), seed("small|head:none|torso:none|legs:none|feet:none"));
    }

    #[test]
    fn test_display_seed_is_padded_uppercase() {
        assert_eq!(display_seed(0xab), "000000AB");
        assert_eq!(display_seed(0xdead_beef), "DEADBEEF");
    }

    #[test]
    fn test_stability_bounds() {
        for s in [0u32, 39, 40, 12345, u32::MAX] {
            let v = stability(s);
            assert!((60..=99).contains(&v));
        }
    }

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_json(&obj).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a = json!({"head": ["x"], "feet": ["y"]});
        let b = json!({"feet": ["y"], "head": ["x"]});
        assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
        assert_eq!(compute_digest(&a).unwrap().len(), 64);
    }
}
