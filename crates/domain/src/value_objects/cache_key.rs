//! Deterministic cache key derivation
//!
//! Keys are 256-bit blake3 digests over a canonical, length-prefixed
//! encoding of the normalized inputs. The same logical input produces a
//! byte-identical key in every process, on every platform.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::errors::DomainError;

/// Codec version folded into every digest; bump to orphan all stored keys
const KEY_VERSION: &[u8] = b"querycache/v1";

/// Fixed-width key naming one cache entry
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Storage key under a cache-kind prefix, e.g. `answer:9f2c…`
    pub fn namespaced(&self, prefix: &str) -> String {
        format!("{prefix}:{}", self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s.trim())
            .map(|hash| Self(*hash.as_bytes()))
            .map_err(|e| DomainError::ValidationError(format!("cache key '{s}': {e}")))
    }
}

impl Serialize for CacheKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize query text for exact matching
///
/// Trims surrounding whitespace, lowercases, then applies Unicode NFC so
/// that precomposed and decomposed spellings (common in Vietnamese input)
/// collapse to the same bytes.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase().nfc().collect()
}

/// Key for the exact-match answer cache
pub fn exact_key(query: &str) -> CacheKey {
    let mut hasher = KeyHasher::new(b"exact");
    hasher.field(normalize_query(query).as_bytes());
    hasher.finish()
}

/// Key for the retrieval cache
///
/// `filters` may arrive in any insertion order; they are sorted by key
/// before digesting. Duplicate keys keep the last value seen.
pub fn retrieval_key<I, K, V>(query: &str, k: u32, filters: I) -> CacheKey
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = filters
        .into_iter()
        .map(|(key, value)| (key.as_ref().to_string(), value.as_ref().to_string()))
        .collect();

    let mut hasher = KeyHasher::new(b"retrieval");
    hasher.field(normalize_query(query).as_bytes());
    hasher.field(&k.to_le_bytes());
    hasher.field(&(sorted.len() as u64).to_le_bytes());
    for (key, value) in &sorted {
        hasher.field(key.as_bytes());
        hasher.field(value.as_bytes());
    }
    hasher.finish()
}

/// Length-prefixed field writer so that `("ab","c")` and `("a","bc")` differ
struct KeyHasher(blake3::Hasher);

impl KeyHasher {
    fn new(kind: &[u8]) -> Self {
        let mut hasher = Self(blake3::Hasher::new());
        hasher.0.update(KEY_VERSION);
        hasher.field(kind);
        hasher
    }

    fn field(&mut self, bytes: &[u8]) {
        self.0.update(&(bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
    }

    fn finish(self) -> CacheKey {
        CacheKey(*self.0.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn exact_key_ignores_case_and_surrounding_whitespace() {
        assert_eq!(
            exact_key("  Điều kiện tham gia đấu thầu "),
            exact_key("điều kiện tham gia đấu thầu")
        );
    }

    #[test]
    fn exact_key_unifies_unicode_forms() {
        let composed = "\u{1ec1}"; // ề precomposed
        let decomposed = "e\u{302}\u{300}"; // e + circumflex + grave
        assert_ne!(composed, decomposed);
        assert_eq!(exact_key(composed), exact_key(decomposed));
    }

    #[test]
    fn exact_key_differs_for_different_queries() {
        assert_ne!(exact_key("bid security"), exact_key("bid bond"));
    }

    #[test]
    fn retrieval_key_ignores_filter_insertion_order() {
        let a = [("status", "active"), ("year", "2024")];
        let b = [("year", "2024"), ("status", "active")];
        assert_eq!(retrieval_key("q", 5, a), retrieval_key("q", 5, b));

        let mut map = HashMap::new();
        map.insert("year".to_string(), "2024".to_string());
        map.insert("status".to_string(), "active".to_string());
        assert_eq!(retrieval_key("q", 5, &map), retrieval_key("q", 5, a));
    }

    #[test]
    fn retrieval_key_depends_on_k_and_filters() {
        let none: [(&str, &str); 0] = [];
        assert_ne!(retrieval_key("q", 5, none), retrieval_key("q", 6, none));
        assert_ne!(
            retrieval_key("q", 5, none),
            retrieval_key("q", 5, [("status", "active")])
        );
    }

    #[test]
    fn retrieval_key_is_unambiguous_across_field_boundaries() {
        assert_ne!(
            retrieval_key("q", 1, [("ab", "c")]),
            retrieval_key("q", 1, [("a", "bc")])
        );
    }

    #[test]
    fn exact_and_retrieval_keys_never_collide() {
        let none: [(&str, &str); 0] = [];
        assert_ne!(exact_key("q"), retrieval_key("q", 0, none));
    }

    #[test]
    fn key_round_trips_through_hex() {
        let key = exact_key("hello");
        let parsed: CacheKey = key.to_hex().parse().unwrap();
        assert_eq!(key, parsed);
        assert_eq!(key.to_hex().len(), 64);
    }

    #[test]
    fn namespaced_key_has_prefix() {
        let key = exact_key("hello");
        assert!(key.namespaced("answer").starts_with("answer:"));
    }

    #[test]
    fn key_serializes_as_hex_string() {
        let key = exact_key("hello");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key.to_hex()));
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
