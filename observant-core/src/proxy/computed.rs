//! Computed properties.
//!
//! A computed property is a named observable derived from other fields. It is
//! evaluated once when registered and again, synchronously, inside the change
//! round of any of its declared dependencies. Its observable only notifies
//! when the recomputed value differs.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{ObservableProxy, ProxyInner};
use crate::error::{ListenerError, NotifyError, ProxyError, Result};
use crate::graph::{DependencyGraph, NodeKind};
use crate::model::Value;
use crate::reactive::{Observable, RecomputeContext};

pub(crate) type ComputeFn = Rc<dyn Fn(&ObservableProxy) -> Result<Value>>;

struct ComputedEntry {
    compute: ComputeFn,
    observable: Observable<Value>,
}

pub(crate) struct ComputedRegistry {
    entries: RefCell<IndexMap<String, ComputedEntry>>,
    graph: RefCell<DependencyGraph>,
}

impl ComputedRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(IndexMap::new()),
            graph: RefCell::new(DependencyGraph::new()),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub(crate) fn observable(&self, name: &str) -> Option<Observable<Value>> {
        self.entries
            .borrow()
            .get(name)
            .map(|entry| entry.observable.clone())
    }

    /// Current value of every computed property, in registration order.
    pub(crate) fn values(&self) -> Vec<(String, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.observable.get()))
            .collect()
    }

    fn entry(&self, name: &str) -> Option<(ComputeFn, Observable<Value>)> {
        self.entries
            .borrow()
            .get(name)
            .map(|entry| (Rc::clone(&entry.compute), entry.observable.clone()))
    }
}

impl ObservableProxy {
    /// Register a computed property.
    ///
    /// `compute` runs immediately to seed the property's observable, then
    /// again whenever one of `dependencies` changes. Each dependency is looked
    /// up as a tracked field (sync variant first) and then as an already
    /// registered computed property; names that match neither are not wired,
    /// so dependencies must exist before the properties that read them.
    ///
    /// Fails with [`ProxyError::CircularDependency`] if the declared
    /// dependencies between computed properties form a cycle.
    ///
    /// ```rust
    /// use observant_core::model::{Record, Value};
    /// use observant_core::ObservableProxy;
    ///
    /// let person = Record::new().with("first", "Ada").with("last", "Lovelace");
    /// let proxy = ObservableProxy::new(person.into_ref(), false);
    ///
    /// proxy.observable("first")?;
    /// proxy.observable("last")?;
    /// proxy.register_computed(
    ///     "full_name",
    ///     |p| {
    ///         let first = p.observable("first")?.get();
    ///         let last = p.observable("last")?.get();
    ///         Ok(format!("{first} {last}"))
    ///     },
    ///     ["first", "last"],
    /// )?;
    ///
    /// proxy.observable("first")?.set("Augusta".into())?;
    /// assert_eq!(proxy.computed("full_name")?.get(), Value::from("Augusta Lovelace"));
    /// # Ok::<(), observant_core::ProxyError>(())
    /// ```
    pub fn register_computed<F, V, I, S>(
        &self,
        name: &str,
        compute: F,
        dependencies: I,
    ) -> Result<Observable<Value>>
    where
        F: Fn(&ObservableProxy) -> Result<V> + 'static,
        V: Into<Value>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if name.is_empty() {
            return Err(ProxyError::InvalidArgument(
                "computed property name must not be empty".into(),
            ));
        }
        if self.inner.computed.contains(name) {
            return Err(ProxyError::InvalidArgument(format!(
                "computed property `{name}` is already registered"
            )));
        }

        let dependencies: Vec<String> = dependencies
            .into_iter()
            .map(|dep| dep.as_ref().to_string())
            .collect();
        let compute: ComputeFn = Rc::new(move |proxy: &ObservableProxy| -> Result<Value> {
            compute(proxy).map(Into::into)
        });

        // A computed property shadowing a field may read that field.
        let graph_deps: Vec<&str> = dependencies
            .iter()
            .map(String::as_str)
            .filter(|dep| *dep != name || self.inner.classify(dep) != NodeKind::Field)
            .collect();
        let cycle = self
            .inner
            .computed
            .graph
            .borrow()
            .find_cycle(name, &graph_deps);
        if let Some(cycle) = cycle {
            return Err(ProxyError::CircularDependency { cycle });
        }

        let initial = {
            let _ctx = RecomputeContext::enter(self.inner.id, name);
            compute(self)?
        };

        self.inner
            .computed
            .graph
            .borrow_mut()
            .add_computed(name, graph_deps, |dep| self.inner.classify(dep))
            .map_err(|cycle| ProxyError::CircularDependency { cycle })?;

        let observable = Observable::new(initial);
        self.inner.computed.entries.borrow_mut().insert(
            name.to_string(),
            ComputedEntry {
                compute,
                observable: observable.clone(),
            },
        );

        for dep in &dependencies {
            self.wire_dependency(name, dep);
        }

        tracing::debug!(
            proxy = self.inner.id,
            computed = name,
            dependencies = ?dependencies,
            "registered computed property"
        );
        Ok(observable)
    }

    /// The observable of a registered computed property.
    pub fn computed(&self, name: &str) -> Result<Observable<Value>> {
        self.inner
            .computed
            .observable(name)
            .ok_or_else(|| ProxyError::ComputedNotFound(name.to_string()))
    }

    /// Names of all computed properties, each after the computed properties
    /// it depends on.
    pub fn computed_names(&self) -> Vec<String> {
        self.inner.computed.graph.borrow().topological_order()
    }

    fn wire_dependency(&self, name: &str, dep: &str) {
        let weak = Rc::downgrade(&self.inner);
        let target = name.to_string();
        let recompute = Rc::new(move || -> std::result::Result<(), ListenerError> {
            recompute_property(&weak, &target)
        });

        let field = self.inner.fields.borrow().lookup(dep, true);
        if let Some((key, handle)) = field {
            handle.subscribe(recompute);
            tracing::trace!(computed = name, field = %key, "wired computed dependency");
            return;
        }
        if let Some(source) = self.inner.computed.observable(dep) {
            source.try_on_change(move |_| recompute());
            tracing::trace!(computed = name, source = dep, "wired computed dependency");
            return;
        }
        tracing::debug!(
            computed = name,
            dependency = dep,
            "dependency is neither a tracked field nor a computed property; not wired"
        );
    }
}

impl ProxyInner {
    /// How `name` enters the dependency graph.
    pub(crate) fn classify(&self, name: &str) -> NodeKind {
        if self.fields.borrow().lookup(name, true).is_some() {
            return NodeKind::Field;
        }
        if self.computed.contains(name) {
            return NodeKind::Computed;
        }
        match self.model.try_borrow() {
            Ok(model) if model.has_field(name) => NodeKind::Field,
            _ => NodeKind::Unresolved,
        }
    }
}

fn recompute_property(
    weak: &Weak<ProxyInner>,
    name: &str,
) -> std::result::Result<(), ListenerError> {
    let Some(inner) = weak.upgrade() else {
        return Ok(());
    };
    let Some(_ctx) = RecomputeContext::enter(inner.id, name) else {
        tracing::warn!(
            proxy = inner.id,
            computed = name,
            "computed property is already recomputing; skipping recursive update"
        );
        return Ok(());
    };
    let Some((compute, observable)) = inner.computed.entry(name) else {
        return Ok(());
    };

    tracing::trace!(
        proxy = inner.id,
        computed = name,
        depth = RecomputeContext::depth(),
        "recomputing"
    );
    let proxy = ObservableProxy::from_inner(Rc::clone(&inner));
    let value = compute(&proxy)?;
    let mut failures = Vec::new();
    if let Err(err) = observable.set_if_changed(value.clone()) {
        failures.extend(err.into_failures());
    }
    if let Err(err) = inner.validate_attr(name, Some(&value)) {
        failures.extend(err.into_failures());
    }
    NotifyError::check(failures).map_err(Into::into)
}
