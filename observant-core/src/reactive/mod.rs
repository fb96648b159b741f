//! Reactive Primitives
//!
//! This module implements the change notifiers the proxy layer is built on:
//! scalar observables, observable lists, and observable dictionaries.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] holds one value. Setting it runs every listener with the
//! new value, synchronously and in registration order.
//!
//! ## Lists and Dictionaries
//!
//! [`ObservableList`] and [`ObservableDict`] own their contents and publish a
//! structured [`ListChange`] / [`DictChange`] for every mutation, plus
//! kind-specific callbacks (`on_add`, `on_remove`, ...).
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded: handles share state through `Rc` and
//! `RefCell` and are neither `Send` nor `Sync`. Listener lists are snapshotted
//! before each round, so listeners may freely re-enter the notifier, register
//! new listeners, or unsubscribe.
//!
//! A failing listener never aborts a round. The failures are gathered into a
//! [`NotifyError`](crate::NotifyError) returned by the mutating call after
//! every listener has run.

mod change;
mod context;
mod dict;
mod list;
mod observable;
mod subscriber;

pub use change::{ChangeKind, DictChange, ListChange};
pub use context::RecomputeContext;
pub use dict::ObservableDict;
pub use list::ObservableList;
pub use observable::Observable;
pub use subscriber::SubscriberId;
