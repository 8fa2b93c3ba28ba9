#![deny(unsafe_code)]

use std::collections::HashMap;

use crate::normalize::normalize_name;

/// Normalized name → admin code, scoped to one country (or to the country list).
///
/// Iteration follows insertion order, which is the order of the reference
/// rows. Substring and phonetic matching depend on that order being stable.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `name` (normalized here) under `code`.
    ///
    /// Returns false and keeps the earlier entry when the normalized name is
    /// already present or normalizes to nothing.
    pub fn insert(&mut self, name: &str, code: impl Into<String>) -> bool {
        let key = normalize_name(name);
        if key.is_empty() || self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, code.into()));
        true
    }

    /// Exact lookup of an already-normalized name.
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.positions
            .get(normalized)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    /// `(normalized name, code)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, code)| (name.as_str(), code.as_str()))
    }

    /// Normalized names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Entry at `position` in insertion order.
    pub fn entry(&self, position: usize) -> Option<(&str, &str)> {
        self.entries
            .get(position)
            .map(|(name, code)| (name.as_str(), code.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
