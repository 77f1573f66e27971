//! Canonical serialization for deterministic fingerprints.
//!
//! Search documents are fingerprinted so an index can skip writes whose
//! content it already holds.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    let bytes = to_canonical_bytes(value)?;
    Ok(xxh64(&bytes, 0))
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let s = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        assert_eq!(canonical_hash(&s).unwrap(), canonical_hash(&s).unwrap());
        assert_eq!(canonical_hash_hex(&s).unwrap().len(), 16);
    }

    #[test]
    fn test_field_change_changes_hash() {
        let a = TestStruct { name: "a".to_string(), value: 1 };
        let b = TestStruct { name: "a".to_string(), value: 2 };
        assert_ne!(canonical_hash(&a).unwrap(), canonical_hash(&b).unwrap());
    }
}
