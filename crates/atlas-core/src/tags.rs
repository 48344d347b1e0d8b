// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tag maps.

use std::collections::{BTreeMap, BTreeSet};

/// An ordered string-to-string tag map.
///
/// Keys are unique; iteration order is ascending key order so every derived
/// artifact (canonical bytes, merged unions, conflict listings) is
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Creates an empty tag map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no tags are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Looks up the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` when `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts or replaces a tag, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a tag, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterates `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a copy with every key in `discard` removed.
    ///
    /// Used by the duplicate detector to compare tag sets modulo
    /// uninteresting bookkeeping keys.
    #[must_use]
    pub fn without_keys(&self, discard: &BTreeSet<String>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !discard.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Appends the canonical byte encoding of this tag map to `out`.
    ///
    /// Layout: tag count as u64 LE, then per tag the key and value each as a
    /// u64 LE length prefix followed by the exact UTF-8 bytes. Keys appear in
    /// ascending order, so equal maps always produce equal bytes.
    pub fn write_canonical_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.0.len() as u64).to_le_bytes());
        for (k, v) in &self.0 {
            out.extend_from_slice(&(k.len() as u64).to_le_bytes());
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(&(v.len() as u64).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Tags {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bytes_ignore_insertion_order() {
        let a: Tags = [("highway", "residential"), ("name", "High Street")]
            .into_iter()
            .collect();
        let b: Tags = [("name", "High Street"), ("highway", "residential")]
            .into_iter()
            .collect();
        let mut ba = Vec::new();
        let mut bb = Vec::new();
        a.write_canonical_bytes(&mut ba);
        b.write_canonical_bytes(&mut bb);
        assert_eq!(ba, bb);
    }

    #[test]
    fn without_keys_drops_only_listed_keys() {
        let tags: Tags = [("created_by", "editor"), ("name", "A")].into_iter().collect();
        let discard: BTreeSet<String> = ["created_by".to_owned()].into_iter().collect();
        let kept = tags.without_keys(&discard);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get("name"), Some("A"));
    }
}
