//! # Hasher
//!
//! Deterministic content hash of a watched resource's data (spec §4.1).
//!
//! Two semantically identical inputs, differing only in insertion order,
//! must produce identical hashes: keys are sorted before hashing and each
//! entry is framed with `:`/`;` delimiters so that no concatenation of
//! adjacent key/value bytes can collide across different splits.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Compute the hex-encoded SHA-256 hash of a key→bytes mapping.
///
/// An empty or absent mapping hashes to the empty string.
pub fn hash_data<'a, I, K, V>(entries: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str> + Ord + 'a,
    V: AsRef<[u8]> + 'a,
{
    let sorted: BTreeMap<K, V> = entries.into_iter().collect();
    if sorted.is_empty() {
        return String::new();
    }

    let mut hasher = Sha256::new();
    for (key, value) in &sorted {
        hasher.update(key.as_ref().as_bytes());
        hasher.update(b":");
        hasher.update(value.as_ref());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

/// Hash a Secret's opaque `data` map (key → raw bytes).
pub fn hash_secret_data(data: Option<&std::collections::BTreeMap<String, Vec<u8>>>) -> String {
    match data {
        Some(map) if !map.is_empty() => {
            hash_data(map.iter().map(|(k, v)| (k.clone(), v.clone())))
        }
        _ => String::new(),
    }
}

/// Hash a ConfigMap's `data` (string) and `binary_data` (bytes) maps merged,
/// with binary entries winning on key collision.
pub fn hash_configmap_data(
    string_data: Option<&std::collections::BTreeMap<String, String>>,
    binary_data: Option<&std::collections::BTreeMap<String, Vec<u8>>>,
) -> String {
    let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    if let Some(map) = string_data {
        for (k, v) in map {
            merged.insert(k.clone(), v.clone().into_bytes());
        }
    }
    if let Some(map) = binary_data {
        for (k, v) in map {
            merged.insert(k.clone(), v.clone());
        }
    }
    if merged.is_empty() {
        return String::new();
    }
    hash_data(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_and_absent_hash_to_empty_string() {
        assert_eq!(hash_secret_data(None), "");
        assert_eq!(hash_secret_data(Some(&BTreeMap::new())), "");
        assert_eq!(hash_configmap_data(None, None), "");
    }

    #[test]
    fn hash_is_invariant_under_insertion_order() {
        let mut a: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        a.insert("zeta".to_string(), b"1".to_vec());
        a.insert("alpha".to_string(), b"2".to_vec());

        let mut b: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        b.insert("alpha".to_string(), b"2".to_vec());
        b.insert("zeta".to_string(), b"1".to_vec());

        assert_eq!(hash_secret_data(Some(&a)), hash_secret_data(Some(&b)));
    }

    #[test]
    fn hash_changes_when_content_changes() {
        let mut a: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        a.insert("password".to_string(), b"old".to_vec());
        let mut b: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        b.insert("password".to_string(), b"new".to_vec());

        assert_ne!(hash_secret_data(Some(&a)), hash_secret_data(Some(&b)));
    }

    #[test]
    fn rehashing_identical_content_is_stable() {
        let mut a: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        a.insert("k".to_string(), b"v".to_vec());
        assert_eq!(hash_secret_data(Some(&a)), hash_secret_data(Some(&a)));
    }

    #[test]
    fn configmap_binary_wins_on_key_collision() {
        let mut string_data = BTreeMap::new();
        string_data.insert("k".to_string(), "string-value".to_string());
        let mut binary_data = BTreeMap::new();
        binary_data.insert("k".to_string(), b"binary-value".to_vec());

        let merged_hash = hash_configmap_data(Some(&string_data), Some(&binary_data));
        let binary_only_hash = hash_configmap_data(None, Some(&binary_data));
        assert_eq!(merged_hash, binary_only_hash);
    }

    #[test]
    fn delimiter_framing_prevents_adjacent_byte_collision() {
        // Without framing, {"ab":"c"} and {"a":"bc"} would hash identically.
        let mut a: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        a.insert("ab".to_string(), b"c".to_vec());
        let mut b: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        b.insert("a".to_string(), b"bc".to_vec());

        assert_ne!(hash_secret_data(Some(&a)), hash_secret_data(Some(&b)));
    }
}
