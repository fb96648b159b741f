//! Structured change records published by collection notifiers.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

/// What happened to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// One or more items were inserted.
    Add,
    /// One or more items were taken out.
    Remove,
    /// The collection was emptied.
    Clear,
    /// Existing items were overwritten in place.
    Update,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Clear => "clear",
            ChangeKind::Update => "update",
        };
        f.write_str(name)
    }
}

/// A change to an [`ObservableList`](super::ObservableList).
///
/// Single-item operations fill `item`; bulk operations (`extend`, `clear`,
/// `replace`) fill `items`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListChange<T> {
    pub kind: ChangeKind,
    /// Index the change starts at, when it has one.
    pub index: Option<usize>,
    pub item: Option<T>,
    pub items: Option<Vec<T>>,
}

impl<T> ListChange<T> {
    pub(crate) fn single(kind: ChangeKind, index: usize, item: T) -> Self {
        Self {
            kind,
            index: Some(index),
            item: Some(item),
            items: None,
        }
    }

    pub(crate) fn bulk(kind: ChangeKind, index: Option<usize>, items: Vec<T>) -> Self {
        Self {
            kind,
            index,
            item: None,
            items: Some(items),
        }
    }
}

/// A change to an [`ObservableDict`](super::ObservableDict).
///
/// Keyed changes carry `key` and `value` and repeat the pair in `items`;
/// a clear or a wholesale replacement carries only `items`.
#[derive(Debug, Clone, PartialEq)]
pub struct DictChange<K, V>
where
    K: Hash + Eq,
{
    pub kind: ChangeKind,
    pub key: Option<K>,
    pub value: Option<V>,
    pub items: Option<IndexMap<K, V>>,
}

impl<K, V> DictChange<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn keyed(kind: ChangeKind, key: K, value: V) -> Self {
        let mut items = IndexMap::with_capacity(1);
        items.insert(key.clone(), value.clone());
        Self {
            kind,
            key: Some(key),
            value: Some(value),
            items: Some(items),
        }
    }

    pub(crate) fn bulk(kind: ChangeKind, items: IndexMap<K, V>) -> Self {
        Self {
            kind,
            key: None,
            value: None,
            items: Some(items),
        }
    }
}
