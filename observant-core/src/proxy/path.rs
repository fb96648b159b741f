//! Nested path observables.
//!
//! A path such as `"habitat?.location.city"` walks from the proxy's model
//! through nested objects to a leaf field. A segment followed by `?.` is
//! optional: when its value is none the walk stops and the path reads as
//! none instead of failing.
//!
//! Each intermediate object gets its own sub-proxy, cached per path prefix
//! and object identity, so paths sharing a prefix share the observables
//! underneath. A [`PathObservable`] mirrors its current leaf and re-walks the
//! chain whenever an intermediate field changes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::{ObservableProxy, ProxyInner, ProxyOptions};
use crate::error::{ListenerError, NotifyError, ProxyError, Result};
use crate::model::{ModelRef, Value};
use crate::reactive::{Observable, SubscriberId};

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    /// True if the segment was followed by `?.`.
    pub optional: bool,
}

pub type PathSegments = SmallVec<[PathSegment; 4]>;

/// Split `path` into segments.
///
/// ```rust
/// use observant_core::proxy::parse_path;
///
/// let segments = parse_path("habitat.location?.city").unwrap();
/// let parsed: Vec<_> = segments.iter().map(|s| (s.name.as_str(), s.optional)).collect();
/// assert_eq!(parsed, [("habitat", false), ("location", true), ("city", false)]);
/// ```
pub fn parse_path(path: &str) -> Result<PathSegments> {
    if path.is_empty() {
        return Err(path_error(path, "path is empty"));
    }
    path.split('.')
        .map(|raw| {
            let (name, optional) = match raw.strip_suffix('?') {
                Some(name) => (name, true),
                None => (raw, false),
            };
            if name.is_empty() {
                return Err(path_error(path, "path contains an empty segment"));
            }
            Ok(PathSegment {
                name: name.to_string(),
                optional,
            })
        })
        .collect()
}

fn path_error(path: &str, reason: impl Into<String>) -> ProxyError {
    ProxyError::PathResolution {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Sub-proxies and path observables created for one root proxy.
#[derive(Default)]
pub(crate) struct PathCache {
    observables: RefCell<HashMap<String, PathObservable>>,
    proxies: RefCell<HashMap<String, (ModelRef, ObservableProxy)>>,
}

/// An observable bound to a nested path.
///
/// Reads return the current leaf value, or none while an optional segment is
/// none. Writes go to the leaf field's observable; while the chain is broken
/// they do nothing.
#[derive(Clone)]
pub struct PathObservable {
    inner: Rc<PathInner>,
}

struct PathInner {
    path: String,
    segments: PathSegments,
    root: Weak<ProxyInner>,
    mirror: Observable<Value>,
    binding: RefCell<Binding>,
}

#[derive(Default)]
struct Binding {
    leaf: Option<(Observable<Value>, SubscriberId)>,
    intermediates: Vec<(Observable<Value>, SubscriberId)>,
}

impl Binding {
    fn release(&mut self) {
        if let Some((leaf, id)) = self.leaf.take() {
            leaf.unsubscribe(id);
        }
        for (observable, id) in self.intermediates.drain(..) {
            observable.unsubscribe(id);
        }
    }
}

impl PathObservable {
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Current leaf value; none while the chain is broken.
    pub fn get(&self) -> Value {
        self.inner.mirror.get()
    }

    /// Write the leaf field. A silent no-op while the chain is broken.
    pub fn set(&self, value: Value) -> std::result::Result<(), NotifyError> {
        let leaf = self
            .inner
            .binding
            .borrow()
            .leaf
            .as_ref()
            .map(|(leaf, _)| leaf.clone());
        match leaf {
            Some(leaf) => leaf.set(value),
            None => {
                tracing::debug!(path = %self.inner.path, "path is broken; ignoring write");
                Ok(())
            }
        }
    }

    /// True while every segment up to the leaf resolves.
    pub fn is_bound(&self) -> bool {
        self.inner.binding.borrow().leaf.is_some()
    }

    pub fn on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&Value) + 'static,
    {
        self.inner.mirror.on_change(f)
    }

    pub fn try_on_change<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(&Value) -> std::result::Result<(), ListenerError> + 'static,
    {
        self.inner.mirror.try_on_change(f)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.mirror.unsubscribe(id)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Walk the chain again and bind to whatever leaf it ends at now.
    ///
    /// `strict` turns a broken required segment into an error; otherwise the
    /// path reads as none.
    fn rebind(&self, strict: bool) -> Result<()> {
        let Some(root) = self.inner.root.upgrade() else {
            return Ok(());
        };
        let root = ObservableProxy::from_inner(root);

        self.inner.binding.borrow_mut().release();
        let walked = self.walk(&root);
        let value = match walked {
            Ok(Some(leaf)) => {
                let value = leaf.get();
                let mirror = self.inner.mirror.clone();
                // Nested leaves live in a sub-proxy; the root records the write
                // under the full path.
                let owner = (self.inner.segments.len() > 1)
                    .then(|| (self.inner.root.clone(), self.inner.path.clone()));
                let id = leaf.try_on_change(move |v| {
                    let mirrored = mirror.set_if_changed(v.clone());
                    if let Some((root, path)) = &owner {
                        if let Some(root) = root.upgrade() {
                            root.dirty.mark(path)?;
                        }
                    }
                    mirrored.map_err(Into::into)
                });
                self.inner.binding.borrow_mut().leaf = Some((leaf, id));
                value
            }
            Ok(None) => Value::None,
            Err(err) if strict => {
                self.inner.binding.borrow_mut().release();
                return Err(err);
            }
            Err(err) => {
                tracing::debug!(path = %self.inner.path, error = %err, "path no longer resolves");
                Value::None
            }
        };
        self.inner.mirror.set_if_changed(value)?;
        Ok(())
    }

    /// Resolve the leaf observable. `Ok(None)` means an optional segment was
    /// none.
    fn walk(&self, root: &ObservableProxy) -> Result<Option<Observable<Value>>> {
        let segments = &self.inner.segments;
        let path = &self.inner.path;
        let mut proxy = root.clone();
        let mut prefix = String::new();

        let (leaf, intermediates) = match segments.split_last() {
            Some(split) => split,
            None => return Err(path_error(path, "path is empty")),
        };

        for segment in intermediates {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(&segment.name);

            let observable = proxy
                .observable(&segment.name)
                .map_err(|err| path_error(path, err.to_string()))?;
            self.watch(&observable);

            match observable.get() {
                Value::Object(model) => {
                    proxy = root.sub_proxy(&prefix, model);
                }
                Value::None if segment.optional => return Ok(None),
                Value::None => {
                    return Err(path_error(path, format!("segment `{}` is none", segment.name)))
                }
                other => {
                    let kind = other.kind_name();
                    return Err(path_error(
                        path,
                        format!("segment `{}` is a {kind}, not an object", segment.name),
                    ));
                }
            }
        }

        proxy
            .observable(&leaf.name)
            .map(Some)
            .map_err(|err| path_error(path, err.to_string()))
    }

    /// Re-walk the path whenever `observable` changes.
    fn watch(&self, observable: &Observable<Value>) {
        let weak = Rc::downgrade(&self.inner);
        let id = observable.try_on_change(move |_| {
            match weak.upgrade() {
                Some(inner) => PathObservable { inner }.rebind(false).map_err(Into::into),
                None => Ok(()),
            }
        });
        self.inner
            .binding
            .borrow_mut()
            .intermediates
            .push((observable.clone(), id));
    }
}

impl std::fmt::Debug for PathObservable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathObservable")
            .field("path", &self.inner.path)
            .field("value", &self.inner.mirror.get())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl ObservableProxy {
    /// Observable for a nested path such as `"habitat?.location.city"`.
    ///
    /// Calling this twice with the same path returns the same observable.
    /// Fails with [`ProxyError::PathResolution`] if the path is malformed or
    /// a required segment does not resolve.
    pub fn observable_for_path(&self, path: &str) -> Result<PathObservable> {
        if let Some(existing) = self.inner.paths.observables.borrow().get(path) {
            return Ok(existing.clone());
        }

        let segments = parse_path(path)?;
        let observable = PathObservable {
            inner: Rc::new(PathInner {
                path: path.to_string(),
                segments,
                root: Rc::downgrade(&self.inner),
                mirror: Observable::new(Value::None),
                binding: RefCell::new(Binding::default()),
            }),
        };
        observable.rebind(true)?;

        tracing::debug!(
            proxy = self.inner.id,
            path,
            bound = observable.is_bound(),
            "bound path observable"
        );
        self.inner
            .paths
            .observables
            .borrow_mut()
            .insert(path.to_string(), observable.clone());
        Ok(observable)
    }

    /// Save every cached sub-proxy into its own object.
    ///
    /// An object that is already borrowed, such as the target of the
    /// enclosing save, is skipped.
    pub(crate) fn save_nested(&self) -> Result<()> {
        let nested: Vec<(ModelRef, ObservableProxy)> =
            self.inner.paths.proxies.borrow().values().cloned().collect();
        for (model, proxy) in nested {
            match model.try_borrow_mut() {
                Ok(mut target) => proxy.save_to(&mut *target)?,
                Err(_) => tracing::debug!(
                    proxy = proxy.inner.id,
                    "nested object is borrowed; skipping save"
                ),
            }
        }
        Ok(())
    }

    /// The cached sub-proxy for the object at `prefix`, replaced if the
    /// object there is no longer the same one.
    fn sub_proxy(&self, prefix: &str, model: ModelRef) -> ObservableProxy {
        let mut proxies = self.inner.paths.proxies.borrow_mut();
        if let Some((cached_model, proxy)) = proxies.get(prefix) {
            if Rc::ptr_eq(cached_model, &model) {
                return proxy.clone();
            }
        }
        let proxy = ObservableProxy::with_options(
            Rc::clone(&model),
            ProxyOptions::new().sync(self.inner.default_sync),
        );
        proxies.insert(prefix.to_string(), (model, proxy.clone()));
        proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(path: &str) -> Vec<(String, bool)> {
        parse_path(path)
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.optional))
            .collect()
    }

    #[test]
    fn parses_required_and_optional_segments() {
        assert_eq!(names("name"), vec![("name".to_string(), false)]);
        assert_eq!(
            names("habitat?.location?.city"),
            vec![
                ("habitat".to_string(), true),
                ("location".to_string(), true),
                ("city".to_string(), false),
            ]
        );
    }

    #[test]
    fn rejects_empty_paths_and_segments() {
        for bad in ["", "a..b", ".a", "a.", "a.?.b"] {
            let err = parse_path(bad).unwrap_err();
            assert!(
                matches!(err, ProxyError::PathResolution { .. }),
                "{bad:?} should be rejected"
            );
        }
    }
}
