//! Keys currently held down
//!
//! An insertion-ordered set: order matters for ordered combo matching, and a
//! key is never recorded twice.

use crate::key::KeyName;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressedKeys {
    keys: Vec<KeyName>,
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &KeyName) -> bool {
        self.keys.contains(key)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.keys.iter().any(|key| key == name)
    }

    /// Record a key as held. Returns `false` if it was already held.
    pub fn insert(&mut self, key: KeyName) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Forget every occurrence of a key.
    pub fn remove(&mut self, key: &KeyName) -> bool {
        let before = self.keys.len();
        self.keys.retain(|held| held != key);
        self.keys.len() != before
    }

    /// Forget the first held key equal to any of `candidates`.
    pub fn remove_first_of(&mut self, candidates: &[&KeyName]) -> Option<KeyName> {
        let index = self
            .keys
            .iter()
            .position(|held| candidates.iter().any(|candidate| *candidate == held))?;
        Some(self.keys.remove(index))
    }

    /// Held keys with `key` moved (or appended) to the end: the view a combo
    /// is matched against when `key` goes down.
    pub fn snapshot_with(&self, key: &KeyName) -> Vec<KeyName> {
        let mut snapshot: Vec<KeyName> = self
            .keys
            .iter()
            .filter(|held| *held != key)
            .cloned()
            .collect();
        snapshot.push(key.clone());
        snapshot
    }

    pub fn as_slice(&self) -> &[KeyName] {
        &self.keys
    }

    pub fn to_vec(&self) -> Vec<KeyName> {
        self.keys.clone()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
