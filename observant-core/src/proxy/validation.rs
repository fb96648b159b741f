//! Field validation.
//!
//! Validators are grouped under an error key. By default the key is the
//! attribute itself; an explicit group key lets several attributes report
//! under one entry. Every pass over a group runs all of its validators and
//! stores their messages, in registration order, in the error map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::NotifyError;
use crate::model::Value;
use crate::reactive::{ChangeKind, DictChange, Observable, ObservableDict};

/// Anything a validator may return.
///
/// `None` means valid. An `Err` is reported through its `Display` text, the
/// same as a returned message.
pub trait IntoValidation {
    fn into_message(self) -> Option<String>;
}

impl IntoValidation for Option<String> {
    fn into_message(self) -> Option<String> {
        self
    }
}

impl IntoValidation for Option<&str> {
    fn into_message(self) -> Option<String> {
        self.map(str::to_string)
    }
}

impl<E: Display> IntoValidation for Result<Option<String>, E> {
    fn into_message(self) -> Option<String> {
        match self {
            Ok(message) => message,
            Err(err) => Some(err.to_string()),
        }
    }
}

pub(crate) type Check = Rc<dyn Fn(&Value) -> Option<String>>;

#[derive(Clone)]
struct ValidatorEntry {
    attr: String,
    check: Check,
}

/// Current value of an attribute, or `None` to skip its validators.
pub(crate) type Lookup<'a> = &'a dyn Fn(&str) -> Option<Value>;

pub(crate) struct ValidationEngine {
    validators: RefCell<IndexMap<String, Vec<ValidatorEntry>>>,
    errors: ObservableDict<String, Vec<String>>,
    valid: Observable<bool>,
    per_key: RefCell<HashMap<String, Observable<Vec<String>>>>,
}

impl ValidationEngine {
    pub(crate) fn new() -> Self {
        Self {
            validators: RefCell::new(IndexMap::new()),
            errors: ObservableDict::new(IndexMap::new()),
            valid: Observable::new(true),
            per_key: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn add(&self, group: &str, attr: &str, check: Check) {
        self.validators
            .borrow_mut()
            .entry(group.to_string())
            .or_default()
            .push(ValidatorEntry {
                attr: attr.to_string(),
                check,
            });
    }

    /// Re-run every group that has a validator on `attr`.
    pub(crate) fn validate_attr(&self, attr: &str, lookup: Lookup<'_>) -> Result<(), NotifyError> {
        let groups: Vec<String> = self
            .validators
            .borrow()
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| e.attr == attr))
            .map(|(group, _)| group.clone())
            .collect();

        let mut failures = Vec::new();
        for group in groups {
            if let Err(err) = self.validate_group(&group, lookup) {
                failures.extend(err.into_failures());
            }
        }
        NotifyError::check(failures)
    }

    /// Run every validator of `group` and store the combined messages.
    pub(crate) fn validate_group(
        &self,
        group: &str,
        lookup: Lookup<'_>,
    ) -> Result<(), NotifyError> {
        let entries = match self.validators.borrow().get(group) {
            Some(entries) => entries.clone(),
            None => return Ok(()),
        };

        let messages: Vec<String> = entries
            .iter()
            .filter_map(|entry| {
                let value = lookup(&entry.attr)?;
                (entry.check)(&value)
            })
            .collect();

        let mut failures = Vec::new();
        let stored = if messages.is_empty() {
            self.errors.remove(&group.to_string()).map(|_| ())
        } else if self.errors.get(&group.to_string()).as_ref() == Some(&messages) {
            Ok(())
        } else {
            self.errors.insert(group.to_string(), messages).map(|_| ())
        };
        if let Err(err) = stored {
            failures.extend(err.into_failures());
        }
        if let Err(err) = self.refresh_validity() {
            failures.extend(err.into_failures());
        }
        NotifyError::check(failures)
    }

    pub(crate) fn validate_all(&self, lookup: Lookup<'_>) -> Result<(), NotifyError> {
        let groups: Vec<String> = self.validators.borrow().keys().cloned().collect();
        let mut failures = Vec::new();
        for group in groups {
            if let Err(err) = self.validate_group(&group, lookup) {
                failures.extend(err.into_failures());
            }
        }
        NotifyError::check(failures)
    }

    /// Clear one key's errors, or all of them.
    pub(crate) fn clear(&self, key: Option<&str>) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        let cleared = match key {
            Some(key) => self.errors.remove(&key.to_string()).map(|_| ()),
            None => self.errors.clear(),
        };
        if let Err(err) = cleared {
            failures.extend(err.into_failures());
        }
        if let Err(err) = self.refresh_validity() {
            failures.extend(err.into_failures());
        }
        NotifyError::check(failures)
    }

    /// Groups that are keyed by `field` or contain a validator on it.
    pub(crate) fn groups_for(&self, field: &str) -> Vec<String> {
        self.validators
            .borrow()
            .iter()
            .filter(|(group, entries)| {
                group.as_str() == field || entries.iter().any(|e| e.attr == field)
            })
            .map(|(group, _)| group.clone())
            .collect()
    }

    pub(crate) fn errors(&self) -> ObservableDict<String, Vec<String>> {
        self.errors.clone()
    }

    pub(crate) fn is_valid(&self) -> Observable<bool> {
        self.valid.clone()
    }

    /// Observable of the messages stored under `key`, created on first use.
    pub(crate) fn observable_for(&self, key: &str) -> Observable<Vec<String>> {
        if let Some(existing) = self.per_key.borrow().get(key) {
            return existing.clone();
        }

        let observable = Observable::new(self.errors.get(&key.to_string()).unwrap_or_default());
        let mirror = observable.clone();
        let watched = key.to_string();
        self.errors
            .try_on_change(move |change: &DictChange<String, Vec<String>>| {
                let next = match change.kind {
                    ChangeKind::Clear => Some(Vec::new()),
                    ChangeKind::Remove if change.key.as_deref() == Some(watched.as_str()) => {
                        Some(Vec::new())
                    }
                    ChangeKind::Add | ChangeKind::Update => {
                        if change.key.as_deref() == Some(watched.as_str()) {
                            change.value.clone()
                        } else if change.key.is_none() {
                            // Wholesale replacement.
                            change
                                .items
                                .as_ref()
                                .map(|items| items.get(&watched).cloned().unwrap_or_default())
                        } else {
                            None
                        }
                    }
                    ChangeKind::Remove => None,
                };
                match next {
                    Some(messages) => mirror.set_if_changed(messages).map_err(Into::into),
                    None => Ok(()),
                }
            });

        self.per_key
            .borrow_mut()
            .insert(key.to_string(), observable.clone());
        observable
    }

    fn refresh_validity(&self) -> Result<(), NotifyError> {
        self.valid.set_if_changed(self.errors.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<F, R>(f: F) -> Check
    where
        F: Fn(&Value) -> R + 'static,
        R: IntoValidation,
    {
        Rc::new(move |v: &Value| f(v).into_message())
    }

    fn values(pairs: &'static [(&'static str, i64)]) -> impl Fn(&str) -> Option<Value> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| Value::Int(*v))
        }
    }

    #[test]
    fn messages_accumulate_in_registration_order() {
        let engine = ValidationEngine::new();
        engine.add("age", "age", check(|v: &Value| (v.as_int() < Some(18)).then_some("too young")));
        engine.add("age", "age", check(|v: &Value| (v.as_int() < Some(21)).then_some("no drinks")));

        engine.validate_group("age", &values(&[("age", 16)])).unwrap();
        assert_eq!(
            engine.errors().get(&"age".to_string()),
            Some(vec!["too young".to_string(), "no drinks".to_string()])
        );
        assert!(!engine.is_valid().get());

        engine.validate_group("age", &values(&[("age", 19)])).unwrap();
        assert_eq!(engine.observable_for("age").get(), vec!["no drinks"]);

        engine.validate_group("age", &values(&[("age", 30)])).unwrap();
        assert!(engine.errors().is_empty());
        assert!(engine.is_valid().get());
    }

    #[test]
    fn error_results_become_messages() {
        let engine = ValidationEngine::new();
        engine.add(
            "n",
            "n",
            check(|_: &Value| -> Result<Option<String>, std::fmt::Error> { Err(std::fmt::Error) }),
        );

        engine.validate_group("n", &values(&[("n", 1)])).unwrap();
        assert_eq!(engine.errors().get(&"n".to_string()).map(|m| m.len()), Some(1));
    }

    #[test]
    fn missing_values_skip_their_validators() {
        let engine = ValidationEngine::new();
        engine.add("g", "absent", check(|_: &Value| Some("always")));

        engine.validate_all(&values(&[])).unwrap();
        assert!(engine.is_valid().get());
    }

    #[test]
    fn per_key_observable_tracks_map() {
        let engine = ValidationEngine::new();
        engine.add("a", "a", check(|v: &Value| (v.as_int() == Some(0)).then_some("zero")));
        let for_a = engine.observable_for("a");
        assert!(for_a.get().is_empty());

        engine.validate_group("a", &values(&[("a", 0)])).unwrap();
        assert_eq!(for_a.get(), vec!["zero"]);

        engine.clear(None).unwrap();
        assert!(for_a.get().is_empty());
        assert!(engine.is_valid().get());
    }

    #[test]
    fn groups_for_matches_key_and_attr() {
        let engine = ValidationEngine::new();
        engine.add("password_match", "password", check(|_: &Value| None::<String>));
        engine.add("password", "other", check(|_: &Value| None::<String>));

        assert_eq!(engine.groups_for("password"), vec!["password_match", "password"]);
        assert!(engine.groups_for("nothing").is_empty());
    }
}
