//! Ordered keyed children.
//!
//! Sequence, choice and repetition nodes address their children either by
//! position or by a programmer-chosen label, never a mix of both within one
//! node. [`Params`] is the structure both the grammar model and the matcher
//! thread through for this: an ordered list of `(key, value)` pairs that
//! preserves insertion order and rejects duplicate keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A child's address inside one node: its position, or its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Index(usize),
    Label(String),
}

impl Key {
    pub fn is_label(&self) -> bool {
        matches!(self, Key::Label(_))
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Key::Label(label) => Some(label),
            Key::Index(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Label(label) => write!(f, "{label}"),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(label: &str) -> Self {
        Key::Label(label.to_string())
    }
}

impl From<String> for Key {
    fn from(label: String) -> Self {
        Key::Label(label)
    }
}

/// An ordered collection of keyed values.
///
/// Lookup is linear; nodes hold a handful of children and the structure is
/// built once per node, so nothing heavier is warranted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params<T> {
    entries: Vec<(Key, T)>,
}

impl<T> Params<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Children keyed by position, in order.
    pub fn from_indexed(values: impl IntoIterator<Item = T>) -> Self {
        let mut params = Self::new();
        for value in values {
            let key = Key::Index(params.entries.len());
            params.assign(key, value);
        }
        params
    }

    /// Children keyed by label, in order.
    pub fn from_labeled<S: Into<String>>(pairs: impl IntoIterator<Item = (S, T)>) -> Self {
        let mut params = Self::new();
        for (label, value) in pairs {
            params.assign(Key::Label(label.into()), value);
        }
        params
    }

    /// Append a value under `key`. Every key within one collection is
    /// unique and all keys are of one kind, indexed or labeled; violating
    /// either is a caller bug and panics.
    pub fn assign(&mut self, key: impl Into<Key>, value: T) {
        let key = key.into();
        assert!(
            !self.contains_key(&key),
            "duplicate key '{key}' in Params"
        );
        if let Some((first, _)) = self.entries.first() {
            assert!(
                first.is_label() == key.is_label(),
                "cannot mix indexed and labeled keys in one Params"
            );
        }
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// The value at `position` in insertion order, regardless of how it is
    /// keyed.
    pub fn get(&self, position: usize) -> Option<&T> {
        self.entries.get(position).map(|(_, value)| value)
    }

    pub fn get_label(&self, label: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key.label() == Some(label))
            .map(|(_, value)| value)
    }

    pub fn get_key(&self, key: &Key) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &T)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// True when every key is a label (or the collection is empty).
    pub fn all_labeled(&self) -> bool {
        self.keys().all(Key::is_label)
    }
}

impl<T> Default for Params<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_construction_preserves_order() {
        let params = Params::from_indexed(["a", "b", "c"]);
        assert_eq!(params.len(), 3);
        assert_eq!(params.get(1), Some(&"b"));
        let keys: Vec<_> = params.keys().cloned().collect();
        assert_eq!(keys, vec![Key::Index(0), Key::Index(1), Key::Index(2)]);
    }

    #[test]
    fn labeled_construction_preserves_order_and_lookup() {
        let params = Params::from_labeled([("left", 1), ("right", 2)]);
        assert_eq!(params.get_label("right"), Some(&2));
        assert_eq!(params.get_label("missing"), None);
        assert_eq!(params.get(0), Some(&1));
        assert!(params.all_labeled());
    }

    #[test]
    fn positional_access_works_for_labeled_entries() {
        let mut params = Params::new();
        params.assign("first", 10);
        params.assign("second", 20);
        assert_eq!(params.get(1), Some(&20));
        assert_eq!(params.get(2), None);
    }

    #[test]
    #[should_panic(expected = "duplicate key")]
    fn duplicate_keys_are_rejected() {
        let mut params = Params::new();
        params.assign("left", 1);
        params.assign("left", 2);
    }

    #[test]
    #[should_panic(expected = "cannot mix")]
    fn mixed_key_kinds_are_rejected() {
        let mut params = Params::new();
        params.assign(0usize, "positional");
        params.assign("label", "labeled");
    }
}
