//! Field identity and the per-kind observable caches.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ListenerError, ModelError};
use crate::model::Value;
use crate::reactive::{Observable, ObservableDict, ObservableList, SubscriberId};

/// Identifies one tracked field: the attribute name plus whether its
/// observable writes through to the model.
///
/// The same attribute may be tracked twice, once per sync flag; the two
/// observables are independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub attr: String,
    pub sync: bool,
}

impl FieldKey {
    pub fn new(attr: impl Into<String>, sync: bool) -> Self {
        Self {
            attr: attr.into(),
            sync,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sync {
            write!(f, "{} (sync)", self.attr)
        } else {
            f.write_str(&self.attr)
        }
    }
}

/// Which kind of observable an attribute is tracked as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar,
    List,
    Dict,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Scalar => "scalar",
            FieldKind::List => "list",
            FieldKind::Dict => "dict",
        };
        f.write_str(name)
    }
}

/// A cached observable of any kind.
#[derive(Clone)]
pub(crate) enum FieldHandle {
    Scalar(Observable<Value>),
    List(ObservableList<Value>),
    Dict(ObservableDict<String, Value>),
}

impl FieldHandle {
    /// Current value; lists and dicts are copied into a `Value`.
    pub(crate) fn value(&self) -> Value {
        match self {
            FieldHandle::Scalar(obs) => obs.get(),
            FieldHandle::List(list) => Value::List(list.to_vec()),
            FieldHandle::Dict(dict) => Value::Dict(dict.to_map()),
        }
    }

    /// Store `value` without notifying. Values of the wrong shape for a
    /// list or dict are ignored.
    pub(crate) fn set_quiet(&self, value: Value) {
        match (self, value) {
            (FieldHandle::Scalar(obs), value) => obs.set_quiet(value),
            (FieldHandle::List(list), Value::List(items)) => list.replace_quietly(items),
            (FieldHandle::Dict(dict), Value::Dict(entries)) => dict.replace_quietly(entries),
            (handle, value) => tracing::warn!(
                kind = %handle.kind(),
                found = value.kind_name(),
                "ignoring quiet write of mismatched value"
            ),
        }
    }

    /// Attach `f` as a change listener, whatever the kind.
    pub(crate) fn subscribe(&self, f: Rc<dyn Fn() -> Result<(), ListenerError>>) -> SubscriberId {
        match self {
            FieldHandle::Scalar(obs) => obs.try_on_change(move |_| f()),
            FieldHandle::List(list) => list.try_on_change(move |_| f()),
            FieldHandle::Dict(dict) => dict.try_on_change(move |_| f()),
        }
    }

    pub(crate) fn kind(&self) -> FieldKind {
        match self {
            FieldHandle::Scalar(_) => FieldKind::Scalar,
            FieldHandle::List(_) => FieldKind::List,
            FieldHandle::Dict(_) => FieldKind::Dict,
        }
    }
}

/// The proxy's three observable caches plus the kind each attribute was
/// first materialized as.
#[derive(Default)]
pub(crate) struct FieldCache {
    pub(crate) scalars: IndexMap<FieldKey, Observable<Value>>,
    pub(crate) lists: IndexMap<FieldKey, ObservableList<Value>>,
    pub(crate) dicts: IndexMap<FieldKey, ObservableDict<String, Value>>,
    kinds: HashMap<String, FieldKind>,
}

impl FieldCache {
    pub(crate) fn kind_of(&self, attr: &str) -> Option<FieldKind> {
        self.kinds.get(attr).copied()
    }

    pub(crate) fn record_kind(&mut self, attr: &str, kind: FieldKind) {
        self.kinds.entry(attr.to_string()).or_insert(kind);
    }

    pub(crate) fn handle(&self, key: &FieldKey) -> Option<FieldHandle> {
        match self.kinds.get(&key.attr)? {
            FieldKind::Scalar => self.scalars.get(key).cloned().map(FieldHandle::Scalar),
            FieldKind::List => self.lists.get(key).cloned().map(FieldHandle::List),
            FieldKind::Dict => self.dicts.get(key).cloned().map(FieldHandle::Dict),
        }
    }

    /// Look `attr` up with the `preferred` sync flag first, then the other.
    pub(crate) fn lookup(&self, attr: &str, preferred: bool) -> Option<(FieldKey, FieldHandle)> {
        [preferred, !preferred].into_iter().find_map(|sync| {
            let key = FieldKey::new(attr, sync);
            self.handle(&key).map(|handle| (key, handle))
        })
    }

    /// Every cached key, scalars first, then lists, then dicts.
    pub(crate) fn keys(&self) -> Vec<FieldKey> {
        self.scalars
            .keys()
            .chain(self.lists.keys())
            .chain(self.dicts.keys())
            .cloned()
            .collect()
    }

    /// Snapshot of every cached field's current value.
    pub(crate) fn values(&self) -> Vec<(FieldKey, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.handle(&key)?.value();
                Some((key, value))
            })
            .collect()
    }
}

/// Unpack a model value for a list field.
pub(crate) fn expect_list(attr: &str, value: Value) -> Result<Vec<Value>, ModelError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(ModelError::TypeMismatch {
            field: attr.to_string(),
            expected: "list",
            found: other.kind_name(),
        }),
    }
}

/// Unpack a model value for a dict field.
pub(crate) fn expect_dict(attr: &str, value: Value) -> Result<IndexMap<String, Value>, ModelError> {
    match value {
        Value::Dict(entries) => Ok(entries),
        other => Err(ModelError::TypeMismatch {
            field: attr.to_string(),
            expected: "dict",
            found: other.kind_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_by_sync_flag() {
        assert_ne!(FieldKey::new("name", true), FieldKey::new("name", false));
        assert_eq!(FieldKey::new("name", true), FieldKey::new("name", true));
        assert_eq!(FieldKey::new("name", true).to_string(), "name (sync)");
    }

    #[test]
    fn lookup_prefers_requested_sync_flag() {
        let mut cache = FieldCache::default();
        cache.record_kind("name", FieldKind::Scalar);
        cache
            .scalars
            .insert(FieldKey::new("name", false), Observable::new(Value::from("a")));

        let (key, handle) = cache.lookup("name", true).unwrap();
        assert!(!key.sync);
        assert_eq!(handle.value(), Value::from("a"));

        cache
            .scalars
            .insert(FieldKey::new("name", true), Observable::new(Value::from("b")));
        let (key, _) = cache.lookup("name", true).unwrap();
        assert!(key.sync);
    }

    #[test]
    fn first_kind_wins() {
        let mut cache = FieldCache::default();
        cache.record_kind("tags", FieldKind::List);
        cache.record_kind("tags", FieldKind::Scalar);
        assert_eq!(cache.kind_of("tags"), Some(FieldKind::List));
    }

    #[test]
    fn quiet_write_ignores_wrong_shape() {
        let list = ObservableList::new(vec![Value::Int(1)]);
        let handle = FieldHandle::List(list.clone());

        handle.set_quiet(Value::Int(5));
        assert_eq!(list.to_vec(), vec![Value::Int(1)]);

        handle.set_quiet(Value::List(vec![]));
        assert!(list.is_empty());
    }
}
