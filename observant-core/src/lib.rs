//! Observant Core
//!
//! Observable primitives and an observable proxy over plain data objects.
//! It implements:
//!
//! - Change notifiers for scalars, lists and dicts
//! - A proxy that exposes a model's fields as cached observables
//! - Dirty tracking, validation, computed properties and undo/redo
//! - Observables bound to nested paths through optional segments
//!
//! Everything is single-threaded and synchronous. A change runs every
//! listener before the call that made it returns; failed listeners do not
//! stop the others and are reported afterwards as a [`NotifyError`].
//!
//! # Architecture
//!
//! - `reactive`: `Observable`, `ObservableList`, `ObservableDict`
//! - `graph`: the dependency graph between computed properties
//! - `model`: the `Model` reflection trait and the dynamic `Value`
//! - `proxy`: `ObservableProxy` and its trackers
//!
//! # Example
//!
//! ```rust
//! use observant_core::model::{Record, Value};
//! use observant_core::{ObservableProxy, ProxyOptions};
//!
//! let user = Record::new().with("username", "ab").with("age", 17).into_ref();
//! let proxy = ObservableProxy::with_options(user, ProxyOptions::new().undo(true));
//!
//! proxy.add_validator("username", |v| {
//!     (v.as_str().map_or(0, str::len) < 3).then_some("too short")
//! })?;
//! proxy.add_validator("age", |v| (v.as_int() < Some(18)).then_some("too young"))?;
//! assert!(!proxy.is_valid().get());
//!
//! proxy.update([("username", Value::from("abc")), ("age", Value::from(18))])?;
//! assert!(proxy.is_valid().get());
//!
//! proxy.undo("age");
//! assert_eq!(proxy.observable("age")?.get(), Value::Int(17));
//! # Ok::<(), observant_core::ProxyError>(())
//! ```

pub mod graph;
pub mod model;
pub mod proxy;
pub mod reactive;

mod error;

pub use error::{ListenerError, ModelError, NotifyError, ProxyError, Result};
pub use model::{Model, ModelRef, Record, Value};
pub use proxy::{
    Diagnostic, FieldKey, FieldKind, FieldOptions, ObservableProxy, PathObservable, ProxyOptions,
    UndoConfig,
};
pub use reactive::{Observable, ObservableDict, ObservableList, SubscriberId};
