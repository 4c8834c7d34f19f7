//! Aggregate results of batch operations

use crate::errors::{CacheError, Result};
use crate::result::{DeleteResult, GetResult, HasResult, SetResult};
use std::collections::hash_map::{IntoIter, Iter};
use std::collections::HashMap;
use std::hash::Hash;

/// Access to the error carried by a per-item result
pub trait ItemResult {
    /// The item's error, excluding the not-exists sentinel
    fn item_err(&self) -> Option<&CacheError>;
}

impl<V> ItemResult for GetResult<V> {
    fn item_err(&self) -> Option<&CacheError> {
        self.err()
    }
}

impl ItemResult for SetResult {
    fn item_err(&self) -> Option<&CacheError> {
        self.err()
    }
}

impl ItemResult for HasResult {
    fn item_err(&self) -> Option<&CacheError> {
        self.err()
    }
}

impl ItemResult for DeleteResult {
    fn item_err(&self) -> Option<&CacheError> {
        self.err()
    }
}

/// Per-key results of one batch call
#[derive(Debug, Clone)]
pub struct BatchResult<K, R> {
    items: HashMap<K, R>,
}

pub type MGetResult<K, V> = BatchResult<K, GetResult<V>>;
pub type MSetResult<K> = BatchResult<K, SetResult>;
pub type MHasResult<K> = BatchResult<K, HasResult>;
pub type MDeleteResult<K> = BatchResult<K, DeleteResult>;

impl<K, R> BatchResult<K, R>
where
    K: Eq + Hash,
    R: ItemResult,
{
    pub fn new(items: HashMap<K, R>) -> Self {
        Self { items }
    }

    /// The raw result for `key`, if the batch produced one
    pub fn get(&self, key: &K) -> Option<&R> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    /// The first per-item error encountered, if any
    pub fn err(&self) -> Option<&CacheError> {
        self.items.values().find_map(R::item_err)
    }

    pub fn has_error(&self) -> bool {
        self.err().is_some()
    }

    pub fn iter(&self) -> Iter<'_, K, R> {
        self.items.iter()
    }

    pub fn into_inner(self) -> HashMap<K, R> {
        self.items
    }
}

impl<K, R> IntoIterator for BatchResult<K, R> {
    type Item = (K, R);
    type IntoIter = IntoIter<K, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<K, R> FromIterator<(K, R)> for BatchResult<K, R>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> BatchResult<K, GetResult<V>> {
    /// Decode the value for `key`; a key missing from the batch is a miss
    pub fn value(&self, key: &K) -> Result<Option<V>> {
        match self.items.get(key) {
            Some(result) => result.value(),
            None => Ok(None),
        }
    }
}

impl<K: Eq + Hash> BatchResult<K, HasResult> {
    /// Presence of `key`; a key missing from the batch is absent
    pub fn has(&self, key: &K) -> bool {
        self.items.get(key).is_some_and(HasResult::has)
    }
}

impl<K: Eq + Hash> BatchResult<K, DeleteResult> {
    /// Total number of entries removed across the batch
    pub fn deleted(&self) -> usize {
        self.items.values().map(DeleteResult::count).sum()
    }

    /// Entries removed for `key`; zero when the key is missing from the batch
    pub fn deleted_for(&self, key: &K) -> usize {
        self.items.get(key).map_or(0, DeleteResult::count)
    }
}
