//! Observable list.
//!
//! Every mutating call publishes exactly one [`ListChange`] to the general
//! `on_change` listeners, after the kind-specific ones (`on_add`, `on_remove`,
//! `on_clear`) have run. Read accessors never notify, and neither do the
//! reordering calls (`sort`, `sort_by`, `sort_by_key`, `reverse`): the items
//! stay the same, only their order moves.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::change::{ChangeKind, ListChange};
use super::observable::next_observable_id;
use super::subscriber::{infallible, ListenerSet, SubscriberId};
use crate::error::{ListenerError, NotifyError};

struct Inner<T> {
    id: u64,
    items: RefCell<Vec<T>>,
    change: ListenerSet<ListChange<T>>,
    add: ListenerSet<(T, usize)>,
    remove: ListenerSet<(T, usize)>,
    clear: ListenerSet<Vec<T>>,
}

/// A `Vec` that notifies listeners about every mutation.
pub struct ObservableList<T> {
    inner: Rc<Inner<T>>,
}

impl<T> ObservableList<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a list owning `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: next_observable_id(),
                items: RefCell::new(items),
                change: ListenerSet::new(),
                add: ListenerSet::new(),
                remove: ListenerSet::new(),
                clear: ListenerSet::new(),
            }),
        }
    }

    /// Create a list holding a copy of `items`.
    pub fn from_slice(items: &[T]) -> Self {
        Self::new(items.to_vec())
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.inner.items.borrow().contains(item)
    }

    /// Position of the first element equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.items.borrow().iter().position(|x| x == item)
    }

    /// Number of elements equal to `item`.
    pub fn count(&self, item: &T) -> usize {
        self.inner.items.borrow().iter().filter(|x| *x == item).count()
    }

    /// Copy of the current items.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Borrow the items for the duration of `f`. `f` must not mutate the list.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    /// Append an item.
    pub fn push(&self, item: T) -> Result<(), NotifyError> {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.notify_add(item, index)
    }

    /// Append several items as one change.
    pub fn extend(&self, new_items: Vec<T>) -> Result<(), NotifyError> {
        if new_items.is_empty() {
            return Ok(());
        }
        let start = {
            let mut items = self.inner.items.borrow_mut();
            let start = items.len();
            items.extend(new_items.iter().cloned());
            start
        };

        let mut failures = Vec::new();
        for (offset, item) in new_items.iter().enumerate() {
            self.inner
                .add
                .notify(&(item.clone(), start + offset), &mut failures);
        }
        let change = ListChange::bulk(ChangeKind::Add, Some(start), new_items);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    /// Insert `item` at `index`, clamped to the list length.
    pub fn insert(&self, index: usize, item: T) -> Result<(), NotifyError> {
        let index = {
            let mut items = self.inner.items.borrow_mut();
            let index = index.min(items.len());
            items.insert(index, item.clone());
            index
        };
        self.notify_add(item, index)
    }

    /// Replace the item at `index`, publishing one `Update` change.
    ///
    /// Returns the previous item, or `None` (and no change) when `index` is
    /// out of bounds.
    pub fn set(&self, index: usize, item: T) -> Result<Option<T>, NotifyError> {
        let old = {
            let mut items = self.inner.items.borrow_mut();
            match items.get_mut(index) {
                Some(slot) => std::mem::replace(slot, item.clone()),
                None => return Ok(None),
            }
        };
        let mut failures = Vec::new();
        let change = ListChange::single(ChangeKind::Update, index, item);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures).map(|()| Some(old))
    }

    /// Remove the first element equal to `item`. Returns whether one was found.
    pub fn remove_item(&self, item: &T) -> Result<bool, NotifyError> {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).map(|removed| removed.is_some()),
            None => Ok(false),
        }
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Option<T>, NotifyError> {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                return Ok(None);
            }
            items.remove(index)
        };
        self.notify_remove(removed.clone(), index)
            .map(|()| Some(removed))
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Result<Option<T>, NotifyError> {
        let len = self.len();
        if len == 0 {
            return Ok(None);
        }
        self.remove_at(len - 1)
    }

    /// Remove every item. Does nothing on an empty list.
    pub fn clear(&self) -> Result<(), NotifyError> {
        let removed = std::mem::take(&mut *self.inner.items.borrow_mut());
        if removed.is_empty() {
            return Ok(());
        }
        let mut failures = Vec::new();
        self.inner.clear.notify(&removed, &mut failures);
        let change = ListChange::bulk(ChangeKind::Clear, None, removed);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    /// Swap in a whole new sequence, publishing one `Update` change that
    /// carries the new items.
    pub fn replace(&self, items: Vec<T>) -> Result<(), NotifyError> {
        *self.inner.items.borrow_mut() = items.clone();
        let mut failures = Vec::new();
        let change = ListChange::bulk(ChangeKind::Update, Some(0), items);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    /// Sort in place without notifying.
    pub fn sort(&self)
    where
        T: Ord,
    {
        self.inner.items.borrow_mut().sort();
    }

    /// Stable sort with a comparator, without notifying. `compare` must not
    /// touch the list.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.inner.items.borrow_mut().sort_by(compare);
    }

    /// Stable sort by a derived key, without notifying. Pass `descending` to
    /// flip the order while keeping equal keys in place.
    pub fn sort_by_key<K, F>(&self, mut key: F, descending: bool)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        let mut items = self.inner.items.borrow_mut();
        if descending {
            items.sort_by(|a, b| key(b).cmp(&key(a)));
        } else {
            items.sort_by_key(key);
        }
    }

    /// Reverse in place without notifying.
    pub fn reverse(&self) {
        self.inner.items.borrow_mut().reverse();
    }

    /// Swap in a whole new sequence without notifying anyone.
    pub fn replace_quietly(&self, items: Vec<T>) {
        *self.inner.items.borrow_mut() = items;
    }

    /// Listen to every change.
    pub fn on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&ListChange<T>) + 'static,
    {
        self.inner.change.add(infallible(f))
    }

    /// Listen to every change with a fallible listener.
    pub fn try_on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&ListChange<T>) -> Result<(), ListenerError> + 'static,
    {
        self.inner.change.add(Rc::new(f))
    }

    /// Listen to insertions; called with the item and its index.
    pub fn on_add<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&T, usize) + 'static,
    {
        self.inner
            .add
            .add(infallible(move |(item, index): &(T, usize)| f(item, *index)))
    }

    /// Listen to removals; called with the item and the index it had.
    pub fn on_remove<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&T, usize) + 'static,
    {
        self.inner
            .remove
            .add(infallible(move |(item, index): &(T, usize)| f(item, *index)))
    }

    /// Listen to `clear`; called with the removed items.
    pub fn on_clear<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&[T]) + 'static,
    {
        self.inner
            .clear
            .add(infallible(move |items: &Vec<T>| f(items.as_slice())))
    }

    /// Detach a listener of any kind.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.change.remove(id)
            || self.inner.add.remove(id)
            || self.inner.remove.remove(id)
            || self.inner.clear.remove(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify_add(&self, item: T, index: usize) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        self.inner.add.notify(&(item.clone(), index), &mut failures);
        let change = ListChange::single(ChangeKind::Add, index, item);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }

    fn notify_remove(&self, item: T, index: usize) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        self.inner.remove.notify(&(item.clone(), index), &mut failures);
        let change = ListChange::single(ChangeKind::Remove, index, item);
        self.inner.change.notify(&change, &mut failures);
        NotifyError::check(failures)
    }
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for ObservableList<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableList")
            .field("id", &self.inner.id)
            .field("items", &*self.inner.items.borrow())
            .finish()
    }
}
