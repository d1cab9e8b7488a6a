//! Stable content fingerprints for view definitions and instances.
//!
//! Values are lowered into `serde_cbor::Value` (whose maps are key-ordered) and
//! encoded as self-described CBOR before hashing, so two values that differ only in
//! map insertion order share a fingerprint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub const HASH_PREFIX: &str = "sha256:";

/// Canonical CBOR bytes of `value`.
pub fn to_canonical_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let ordered = serde_cbor::value::to_value(value)?;
    let mut bytes = Vec::with_capacity(256);
    let mut serializer = serde_cbor::ser::Serializer::new(&mut bytes);
    serializer.self_describe()?;
    ordered.serialize(&mut serializer)?;
    Ok(bytes)
}

/// SHA-256 fingerprint, rendered as `sha256:<64 hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Fingerprint a value through its canonical CBOR encoding.
    pub fn of_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_cbor::Error> {
        to_canonical_cbor(value).map(|bytes| Self::of_bytes(&bytes))
    }

    /// Fingerprint raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Hash(digest)
    }

    /// Borrow the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Prefixed form, `sha256:<64 hex>`.
    pub fn to_hex(&self) -> String {
        format!("{HASH_PREFIX}{}", self.digest_hex())
    }

    /// Digest without the algorithm prefix.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HASH_PREFIX}{}", self.digest_hex())
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let digest = text
            .strip_prefix(HASH_PREFIX)
            .ok_or(HashParseError::MissingPrefix)?;
        if digest.len() != 64 {
            return Err(HashParseError::InvalidLength(digest.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digest, &mut bytes)?;
        Ok(Hash(bytes))
    }
}

// An instance fingerprint embeds its definition's id, so ids serialize as text.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("fingerprint missing '{HASH_PREFIX}' prefix")]
    MissingPrefix,
    #[error("fingerprint digest must be 64 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let mut first = IndexMap::new();
        first.insert("name", json!("sum"));
        first.insert("type", json!("collection"));
        first.insert("args", json!({"x": 1, "y": [1, 2]}));

        let mut second = IndexMap::new();
        second.insert("args", json!({"y": [1, 2], "x": 1}));
        second.insert("type", json!("collection"));
        second.insert("name", json!("sum"));

        assert_eq!(
            Hash::of_cbor(&first).unwrap(),
            Hash::of_cbor(&second).unwrap()
        );
    }

    #[test]
    fn single_character_change_alters_fingerprint() {
        let a = json!({"each": {"function": "|step| { step.index }", "meta": null}});
        let b = json!({"each": {"function": "|step| { step.indey }", "meta": null}});
        assert_ne!(Hash::of_cbor(&a).unwrap(), Hash::of_cbor(&b).unwrap());
    }

    #[test]
    fn sequence_order_is_significant() {
        let a = json!({"properties": ["a", "b"]});
        let b = json!({"properties": ["b", "a"]});
        assert_ne!(Hash::of_cbor(&a).unwrap(), Hash::of_cbor(&b).unwrap());
    }

    #[test]
    fn fingerprint_does_not_mutate_input() {
        let value = json!({"b": 1, "a": 2});
        let before = value.clone();
        let _ = Hash::of_cbor(&value).unwrap();
        assert_eq!(value, before);
    }

    #[test]
    fn parses_its_own_rendering() {
        let text = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let hash: Hash = text.parse().unwrap();
        assert_eq!(hash.to_hex(), text);
        assert_eq!(hash.to_string(), text);
        assert_eq!(hash.short(), "0123456789ab");
        assert!(matches!(
            "0123".parse::<Hash>(),
            Err(HashParseError::MissingPrefix)
        ));
        assert!(matches!(
            "sha256:0123".parse::<Hash>(),
            Err(HashParseError::InvalidLength(4))
        ));
    }

    #[test]
    fn serializes_as_prefixed_text() {
        let hash = Hash::of_bytes(b"view");
        let text = serde_json::to_value(hash).unwrap();
        assert_eq!(text, json!(hash.to_hex()));
        let back: Hash = serde_json::from_value(text).unwrap();
        assert_eq!(back, hash);
    }
}
