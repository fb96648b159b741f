//! Observable Implementation
//!
//! An `Observable` is the scalar change notifier. It holds one value and an
//! ordered list of listeners.
//!
//! # How Observables Work
//!
//! 1. `set` stores the new value first, then runs every listener with it,
//!    in registration order, on the calling thread.
//!
//! 2. A listener may call `set` on this or any other observable. The nested
//!    call runs to completion before the outer round continues, so listeners
//!    see values in exactly the order the `set` calls happened.
//!
//! 3. A failing listener does not stop the round. Failures are collected and
//!    returned once every listener has run.
//!
//! # Quiet Writes
//!
//! `set_quiet` replaces the value without running any listener. Undo and redo
//! restore history through this path.
//!
//! # Sharing
//!
//! Cloning an observable yields another handle to the same value and
//! listeners; use [`Observable::ptr_eq`] to test identity.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::subscriber::{infallible, ListenerSet, SubscriberId};
use crate::error::{ListenerError, NotifyError};

/// Counter for generating unique observable IDs.
static OBSERVABLE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_observable_id() -> u64 {
    OBSERVABLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct Inner<T> {
    id: u64,
    value: RefCell<T>,
    listeners: ListenerSet<T>,
}

/// A value that notifies its listeners whenever it is set.
///
/// # Example
///
/// ```rust
/// use observant_core::reactive::Observable;
///
/// let count = Observable::new(0);
/// count.on_change(|v| println!("count is now {v}"));
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Observable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Observable<T>
where
    T: Clone + 'static,
{
    /// Create a new observable with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: next_observable_id(),
                value: RefCell::new(value),
                listeners: ListenerSet::new(),
            }),
        }
    }

    /// Get the observable's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get a clone of the current value. Never notifies.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    ///
    /// `f` must not set this observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify every listener, even if the value is unchanged.
    pub fn set(&self, value: T) -> Result<(), NotifyError> {
        *self.inner.value.borrow_mut() = value.clone();
        let mut failures = Vec::new();
        self.inner.listeners.notify(&value, &mut failures);
        if !failures.is_empty() {
            tracing::warn!(
                observable = self.inner.id,
                failures = failures.len(),
                "change listeners failed"
            );
        }
        NotifyError::check(failures)
    }

    /// Store `value` without running any listener.
    pub fn set_quiet(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> Result<(), NotifyError>
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.inner.value.borrow();
            f(&guard)
        };
        self.set(next)
    }

    /// Register an infallible listener.
    pub fn on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&T) + 'static,
    {
        self.inner.listeners.add(infallible(f))
    }

    /// Register a listener whose failure is reported by the `set` that ran it.
    pub fn try_on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&T) -> Result<(), ListenerError> + 'static,
    {
        self.inner.listeners.add(Rc::new(f))
    }

    /// Remove a listener. Returns false if it was not registered here.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Get the number of listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// True if both handles refer to the same observable.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Like [`set`](Self::set), but does nothing when `value` equals the
    /// current value.
    pub fn set_if_changed(&self, value: T) -> Result<(), NotifyError> {
        if *self.inner.value.borrow() == value {
            return Ok(());
        }
        self.set(value)
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Observable<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.inner.listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn observable_get_and_set() {
        let obs = Observable::new(0);
        assert_eq!(obs.get(), 0);

        obs.set(42).unwrap();
        assert_eq!(obs.get(), 42);
    }

    #[test]
    fn observable_update() {
        let obs = Observable::new(10);
        obs.update(|v| v + 5).unwrap();
        assert_eq!(obs.get(), 15);
    }

    #[test]
    fn observable_notifies_listeners() {
        let obs = Observable::new(0);
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        obs.on_change(move |_| c.set(c.get() + 1));

        assert_eq!(calls.get(), 0);

        obs.set(1).unwrap();
        assert_eq!(calls.get(), 1);

        obs.set(2).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn set_notifies_even_when_value_is_equal() {
        let obs = Observable::new(7);
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        obs.on_change(move |_| c.set(c.get() + 1));

        obs.set(7).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn set_if_changed_skips_equal_values() {
        let obs = Observable::new(String::from("a"));
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        obs.on_change(move |_| c.set(c.get() + 1));

        obs.set_if_changed("a".to_string()).unwrap();
        assert_eq!(calls.get(), 0);

        obs.set_if_changed("b".to_string()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(obs.get(), "b");
    }

    #[test]
    fn set_quiet_skips_listeners() {
        let obs = Observable::new(1);
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        obs.on_change(move |_| c.set(c.get() + 1));

        obs.set_quiet(9);
        assert_eq!(obs.get(), 9);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn observable_unsubscribe() {
        let obs = Observable::new(0);
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let id = obs.on_change(move |_| c.set(c.get() + 1));

        obs.set(1).unwrap();
        assert_eq!(calls.get(), 1);

        assert!(obs.unsubscribe(id));
        obs.set(2).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failing_listener_runs_the_rest_and_reports() {
        let obs = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        obs.on_change(move |v| s.borrow_mut().push(("first", *v)));
        obs.try_on_change(|_| Err(ListenerError::msg("simulated")));
        let s = Rc::clone(&seen);
        obs.on_change(move |v| s.borrow_mut().push(("third", *v)));

        let err = obs.set(3).unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert_eq!(obs.get(), 3);
        assert_eq!(*seen.borrow(), vec![("first", 3), ("third", 3)]);
    }

    #[test]
    fn value_is_stored_before_listeners_run() {
        let obs = Observable::new(0);
        let handle = obs.clone();
        let observed = Rc::new(Cell::new(-1));
        let o = Rc::clone(&observed);
        obs.on_change(move |_| o.set(handle.get()));

        obs.set(11).unwrap();
        assert_eq!(observed.get(), 11);
    }

    #[test]
    fn reentrant_set_completes_depth_first() {
        let first = Observable::new(0);
        let second = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        let s = second.clone();
        first.try_on_change(move |v| {
            l.borrow_mut().push(format!("first={v}"));
            s.set(v * 10)?;
            l.borrow_mut().push("first done".to_string());
            Ok(())
        });
        let l = Rc::clone(&log);
        second.on_change(move |v| l.borrow_mut().push(format!("second={v}")));

        first.set(4).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["first=4", "second=40", "first done"]
        );
    }

    #[test]
    fn observable_clone_shares_state() {
        let a = Observable::new(0);
        let b = a.clone();

        a.set(42).unwrap();
        assert_eq!(b.get(), 42);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());

        let c = Observable::new(42);
        assert!(!a.ptr_eq(&c));
        assert_ne!(a.id(), c.id());
    }
}
