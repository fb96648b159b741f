//! Observable insertion-ordered map.

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::change::{ChangeKind, DictChange};
use super::observable::next_observable_id;
use super::subscriber::{infallible, ListenerSet, SubscriberId};
use crate::error::{ListenerError, NotifyError};

struct Inner<K: Hash + Eq, V> {
    id: u64,
    entries: RefCell<IndexMap<K, V>>,
    change: ListenerSet<DictChange<K, V>>,
    add: ListenerSet<(K, V)>,
    remove: ListenerSet<(K, V)>,
    update: ListenerSet<(K, V)>,
    clear: ListenerSet<IndexMap<K, V>>,
}

/// An [`IndexMap`] that notifies listeners about every mutation.
///
/// Iteration follows insertion order. Overwriting an existing key keeps its
/// position.
pub struct ObservableDict<K: Hash + Eq, V> {
    inner: Rc<Inner<K, V>>,
}

impl<K, V> ObservableDict<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    pub fn new(entries: IndexMap<K, V>) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: next_observable_id(),
                entries: RefCell::new(entries),
                change: ListenerSet::new(),
                add: ListenerSet::new(),
                remove: ListenerSet::new(),
                update: ListenerSet::new(),
                clear: ListenerSet::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.entries.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.entries.borrow().values().cloned().collect()
    }

    /// Copy of the current entries.
    pub fn to_map(&self) -> IndexMap<K, V> {
        self.inner.entries.borrow().clone()
    }

    /// Borrow the entries for the duration of `f`. `f` must not mutate the map.
    pub fn with<R>(&self, f: impl FnOnce(&IndexMap<K, V>) -> R) -> R {
        f(&self.inner.entries.borrow())
    }

    /// Insert or overwrite `key`. Publishes `Add` for a new key and `Update`
    /// for an existing one. Returns the previous value.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>, NotifyError> {
        let previous = self
            .inner
            .entries
            .borrow_mut()
            .insert(key.clone(), value.clone());
        let kind = if previous.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Add
        };
        self.notify_keyed(kind, key, value).map(|()| previous)
    }

    /// Remove `key`, returning its value. Missing keys are not an error.
    pub fn remove(&self, key: &K) -> Result<Option<V>, NotifyError> {
        let removed = self.inner.entries.borrow_mut().shift_remove_entry(key);
        match removed {
            Some((key, value)) => self
                .notify_keyed(ChangeKind::Remove, key, value.clone())
                .map(|()| Some(value)),
            None => Ok(None),
        }
    }

    /// Return the value for `key`, inserting `default` first if it is absent.
    pub fn setdefault(&self, key: K, default: V) -> Result<V, NotifyError> {
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }
        self.insert(key, default.clone())?;
        Ok(default)
    }

    /// Remove `key` and return its value, or `default` if it is absent.
    pub fn pop(&self, key: &K, default: V) -> Result<V, NotifyError> {
        Ok(self.remove(key)?.unwrap_or(default))
    }

    /// Remove and return the most recently inserted entry.
    pub fn popitem(&self) -> Result<Option<(K, V)>, NotifyError> {
        let popped = self.inner.entries.borrow_mut().pop();
        match popped {
            Some((key, value)) => self
                .notify_keyed(ChangeKind::Remove, key.clone(), value.clone())
                .map(|()| Some((key, value))),
            None => Ok(None),
        }
    }

    /// Remove every entry. Does nothing on an empty map.
    pub fn clear(&self) -> Result<(), NotifyError> {
        let removed = std::mem::take(&mut *self.inner.entries.borrow_mut());
        if removed.is_empty() {
            return Ok(());
        }
        let mut failures = Vec::new();
        self.inner.clear.notify(&removed, &mut failures);
        let change = DictChange::bulk(ChangeKind::Clear, removed);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    /// Merge `entries` into the map.
    ///
    /// New keys are announced first, then overwritten ones, each with its own
    /// change.
    pub fn update<I>(&self, entries: I) -> Result<(), NotifyError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut added = Vec::new();
        let mut updated = Vec::new();
        {
            let mut map = self.inner.entries.borrow_mut();
            for (key, value) in entries {
                if map.insert(key.clone(), value.clone()).is_some() {
                    updated.push((key, value));
                } else {
                    added.push((key, value));
                }
            }
        }

        let mut failures = Vec::new();
        for (key, value) in added {
            self.collect_keyed(ChangeKind::Add, key, value, &mut failures);
        }
        for (key, value) in updated {
            self.collect_keyed(ChangeKind::Update, key, value, &mut failures);
        }
        NotifyError::check(failures)
    }

    /// Swap in a whole new mapping, publishing one `Update` change that
    /// carries the new entries.
    pub fn replace(&self, entries: IndexMap<K, V>) -> Result<(), NotifyError> {
        *self.inner.entries.borrow_mut() = entries.clone();
        let mut failures = Vec::new();
        let change = DictChange::bulk(ChangeKind::Update, entries);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    /// Swap in a whole new mapping without notifying anyone.
    pub fn replace_quietly(&self, entries: IndexMap<K, V>) {
        *self.inner.entries.borrow_mut() = entries;
    }

    pub fn on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&DictChange<K, V>) + 'static,
    {
        self.inner.change.add(infallible(f))
    }

    pub fn try_on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&DictChange<K, V>) -> Result<(), ListenerError> + 'static,
    {
        self.inner.change.add(Rc::new(f))
    }

    /// Listen to new keys.
    pub fn on_add<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&K, &V) + 'static,
    {
        self.inner
            .add
            .add(infallible(move |(key, value): &(K, V)| f(key, value)))
    }

    /// Listen to removed keys; called with the value they had.
    pub fn on_remove<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&K, &V) + 'static,
    {
        self.inner
            .remove
            .add(infallible(move |(key, value): &(K, V)| f(key, value)))
    }

    /// Listen to overwritten keys; called with the new value.
    pub fn on_update<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&K, &V) + 'static,
    {
        self.inner
            .update
            .add(infallible(move |(key, value): &(K, V)| f(key, value)))
    }

    /// Listen to `clear`; called with the removed entries.
    pub fn on_clear<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&IndexMap<K, V>) + 'static,
    {
        self.inner.clear.add(infallible(f))
    }

    /// Detach a listener of any kind.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.change.remove(id)
            || self.inner.add.remove(id)
            || self.inner.remove.remove(id)
            || self.inner.update.remove(id)
            || self.inner.clear.remove(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify_keyed(&self, kind: ChangeKind, key: K, value: V) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        self.collect_keyed(kind, key, value, &mut failures);
        NotifyError::check(failures)
    }

    fn collect_keyed(
        &self,
        kind: ChangeKind,
        key: K,
        value: V,
        failures: &mut Vec<ListenerError>,
    ) {
        let specific = match kind {
            ChangeKind::Add => Some(&self.inner.add),
            ChangeKind::Remove => Some(&self.inner.remove),
            ChangeKind::Update => Some(&self.inner.update),
            ChangeKind::Clear => None,
        };
        if let Some(set) = specific {
            set.notify(&(key.clone(), value.clone()), failures);
        }
        let change = DictChange::keyed(kind, key, value);
        self.inner.change.notify(&change, failures);
    }
}

impl<K: Hash + Eq, V> Clone for ObservableDict<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, V> Debug for ObservableDict<K, V>
where
    K: Hash + Eq + Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableDict")
            .field("id", &self.inner.id)
            .field("entries", &*self.inner.entries.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<DictChange<String, i32>>>>;

    fn dict(pairs: &[(&str, i32)]) -> ObservableDict<String, i32> {
        ObservableDict::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    fn record(d: &ObservableDict<String, i32>) -> Log {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        d.on_change(move |change| l.borrow_mut().push(change.clone()));
        log
    }

    #[test]
    fn insert_distinguishes_add_from_update() {
        let d = dict(&[("a", 1)]);
        let log = record(&d);

        assert_eq!(d.insert("b".into(), 2).unwrap(), None);
        assert_eq!(d.insert("a".into(), 10).unwrap(), Some(1));

        let kinds: Vec<_> = log.borrow().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Update]);
        assert_eq!(log.borrow()[1].key.as_deref(), Some("a"));
        assert_eq!(log.borrow()[1].value, Some(10));
        assert_eq!(d.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_missing_key_is_silent() {
        let d = dict(&[("a", 1)]);
        let log = record(&d);

        assert_eq!(d.remove(&"zzz".to_string()).unwrap(), None);
        assert!(log.borrow().is_empty());

        assert_eq!(d.remove(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(log.borrow()[0].kind, ChangeKind::Remove);
        assert!(d.is_empty());
    }

    #[test]
    fn setdefault_only_inserts_when_absent() {
        let d = dict(&[("a", 1)]);
        let log = record(&d);

        assert_eq!(d.setdefault("a".into(), 99).unwrap(), 1);
        assert!(log.borrow().is_empty());

        assert_eq!(d.setdefault("b".into(), 2).unwrap(), 2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(d.get(&"b".to_string()), Some(2));
    }

    #[test]
    fn pop_returns_default_for_missing_key() {
        let d = dict(&[("a", 1)]);
        assert_eq!(d.pop(&"a".to_string(), 0).unwrap(), 1);
        assert_eq!(d.pop(&"a".to_string(), 0).unwrap(), 0);
    }

    #[test]
    fn popitem_takes_most_recent_entry() {
        let d = dict(&[("a", 1), ("b", 2)]);
        let removed = Rc::new(RefCell::new(Vec::new()));
        let r = Rc::clone(&removed);
        d.on_remove(move |k, v| r.borrow_mut().push((k.clone(), *v)));

        assert_eq!(d.popitem().unwrap(), Some(("b".to_string(), 2)));
        assert_eq!(d.popitem().unwrap(), Some(("a".to_string(), 1)));
        assert_eq!(d.popitem().unwrap(), None);
        assert_eq!(removed.borrow().len(), 2);
    }

    #[test]
    fn update_announces_adds_before_updates() {
        let d = dict(&[("a", 1)]);
        let log = record(&d);

        d.update(vec![("a".to_string(), 5), ("b".to_string(), 6)])
            .unwrap();

        let seen: Vec<_> = log
            .borrow()
            .iter()
            .map(|c| (c.kind, c.key.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (ChangeKind::Add, "b".to_string()),
                (ChangeKind::Update, "a".to_string()),
            ]
        );
    }

    #[test]
    fn clear_notifies_once_with_removed_entries() {
        let d = dict(&[("a", 1), ("b", 2)]);
        let log = record(&d);
        let cleared = Rc::new(RefCell::new(0));
        let c = Rc::clone(&cleared);
        d.on_clear(move |items| *c.borrow_mut() += items.len());

        d.clear().unwrap();
        d.clear().unwrap();

        assert_eq!(*cleared.borrow(), 2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].kind, ChangeKind::Clear);
    }

    #[test]
    fn replace_publishes_update_with_new_entries() {
        let d = dict(&[("a", 1)]);
        let log = record(&d);

        let next: IndexMap<String, i32> = [("x".to_string(), 9)].into_iter().collect();
        d.replace(next.clone()).unwrap();

        assert_eq!(d.to_map(), next);
        assert_eq!(log.borrow()[0].kind, ChangeKind::Update);
        assert_eq!(log.borrow()[0].items, Some(next));
    }
}
