//! Listener bookkeeping shared by all change notifiers.
//!
//! Every notifier keeps one or more [`ListenerSet`]s. A set stores its
//! callbacks in registration order and runs them synchronously when a change
//! is published.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::error::ListenerError;

/// Unique identifier for a registered listener.
///
/// Returned by every `on_*` registration so the listener can later be
/// detached with `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter so IDs never repeat within the process.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change callback taking the published payload by reference.
pub(crate) type Callback<A> = Rc<dyn Fn(&A) -> Result<(), ListenerError>>;

/// An ordered list of callbacks for one kind of change.
pub(crate) struct ListenerSet<A: ?Sized> {
    entries: RefCell<Vec<(SubscriberId, Callback<A>)>>,
}

impl<A: ?Sized> ListenerSet<A> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Append a callback; it runs after every callback registered before it.
    pub(crate) fn add(&self, callback: Callback<A>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.borrow_mut().push((id, callback));
        id
    }

    /// Detach a callback. Returns false if the ID was not registered here.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Run every callback with `payload`, appending failures to `failures`.
    ///
    /// The callback list is snapshotted first, so callbacks may register,
    /// detach, or re-enter the notifier freely. Callbacks added during the
    /// round do not run until the next one.
    pub(crate) fn notify(&self, payload: &A, failures: &mut Vec<ListenerError>) {
        let snapshot: SmallVec<[Callback<A>; 4]> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in snapshot {
            if let Err(err) = callback(payload) {
                failures.push(err);
            }
        }
    }
}

impl<A: ?Sized> Default for ListenerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an infallible closure as a callback.
pub(crate) fn infallible<A: ?Sized + 'static>(f: impl Fn(&A) + 'static) -> Callback<A> {
    Rc::new(move |payload: &A| {
        f(payload);
        Ok(())
    })
}
