//! The observable proxy.
//!
//! [`ObservableProxy`] wraps a [`Model`] and hands out observables for its
//! fields. Every field observable is created on first request, cached under
//! its [`FieldKey`], and wired to the proxy's trackers. A change to the field
//! then runs, in this order: the model write-back (sync fields only), dirty
//! tracking, validation, and undo recording. Listeners added afterwards, such
//! as computed dependencies or user callbacks, run after those.

mod computed;
mod dirty;
mod key;
mod options;
mod path;
mod undo;
mod validation;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

pub use key::{FieldKey, FieldKind};
pub use options::{
    Diagnostic, DiagnosticHandler, FieldOptions, ProxyOptions, UndoConfig, DEFAULT_UNDO_MAX,
};
pub use path::{parse_path, PathObservable, PathSegment, PathSegments};
pub use validation::IntoValidation;

use crate::error::{ListenerError, NotifyError, ProxyError, Result};
use crate::model::{Model, ModelRef, Value};
use crate::reactive::{Observable, ObservableDict, ObservableList};
use computed::ComputedRegistry;
use dirty::DirtyTracker;
use key::{expect_dict, expect_list, FieldCache, FieldHandle};
use path::PathCache;
use undo::UndoEngine;
use validation::{Check, ValidationEngine};

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// The listeners every field gets when it is materialized, in attach order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    WriteBack,
    Dirty,
    Validate,
    Undo,
}

impl Stage {
    fn for_field(sync: bool) -> &'static [Stage] {
        if sync {
            &[Stage::WriteBack, Stage::Dirty, Stage::Validate, Stage::Undo]
        } else {
            &[Stage::Dirty, Stage::Validate, Stage::Undo]
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

pub(crate) struct ProxyInner {
    pub(crate) id: u64,
    pub(crate) model: ModelRef,
    pub(crate) default_sync: bool,
    pub(crate) fields: RefCell<FieldCache>,
    dirty: DirtyTracker,
    validation: ValidationEngine,
    pub(crate) computed: ComputedRegistry,
    undo: UndoEngine,
    paths: PathCache,
}

/// Observable view over a model.
///
/// Cloning the proxy is cheap; clones share the same caches and state.
///
/// ```rust
/// use observant_core::model::{Record, Value};
/// use observant_core::ObservableProxy;
///
/// let record = Record::new().with("name", "Rex").into_ref();
/// let proxy = ObservableProxy::new(record.clone(), false);
///
/// let name = proxy.observable("name")?;
/// name.set("Max".into())?;
///
/// assert!(proxy.is_dirty());
/// assert_eq!(record.borrow().get("name"), Some(&Value::from("Rex")));
///
/// proxy.save_to(&mut *record.borrow_mut())?;
/// assert_eq!(record.borrow().get("name"), Some(&Value::from("Max")));
/// assert!(!proxy.is_dirty());
/// # Ok::<(), observant_core::ProxyError>(())
/// ```
#[derive(Clone)]
pub struct ObservableProxy {
    pub(crate) inner: Rc<ProxyInner>,
}

impl ObservableProxy {
    /// Wrap `model`. With `sync` on, field changes write straight through.
    pub fn new(model: ModelRef, sync: bool) -> Self {
        Self::with_options(model, ProxyOptions::new().sync(sync))
    }

    pub fn with_options(model: ModelRef, options: ProxyOptions) -> Self {
        let id = NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed);
        if options.sync && options.undo {
            let diagnostic = Diagnostic::SyncWithUndo;
            tracing::warn!(proxy = id, "{diagnostic}");
            if let Some(handler) = &options.on_diagnostic {
                handler(&diagnostic);
            }
        }

        Self {
            inner: Rc::new(ProxyInner {
                id,
                model,
                default_sync: options.sync,
                fields: RefCell::new(FieldCache::default()),
                dirty: DirtyTracker::new(),
                validation: ValidationEngine::new(),
                computed: ComputedRegistry::new(),
                undo: UndoEngine::new(&options),
                paths: PathCache::default(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self { inner }
    }

    /// The wrapped model.
    pub fn get(&self) -> ModelRef {
        Rc::clone(&self.inner.model)
    }

    pub fn default_sync(&self) -> bool {
        self.inner.default_sync
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- Field materialization ----

    /// Observable for the scalar field `attr`, created on first use.
    ///
    /// Repeated calls with the same sync flag return the same observable.
    pub fn observable(&self, attr: &str) -> Result<Observable<Value>> {
        self.observable_with(attr, FieldOptions::new())
    }

    pub fn observable_with(&self, attr: &str, options: FieldOptions) -> Result<Observable<Value>> {
        match self.materialize(attr, &options, FieldKind::Scalar)? {
            FieldHandle::Scalar(observable) => Ok(observable),
            other => Err(kind_mismatch(attr, other.kind(), FieldKind::Scalar)),
        }
    }

    /// Observable list for the list field `attr`.
    pub fn observable_list(&self, attr: &str) -> Result<ObservableList<Value>> {
        self.observable_list_with(attr, FieldOptions::new())
    }

    pub fn observable_list_with(
        &self,
        attr: &str,
        options: FieldOptions,
    ) -> Result<ObservableList<Value>> {
        match self.materialize(attr, &options, FieldKind::List)? {
            FieldHandle::List(list) => Ok(list),
            other => Err(kind_mismatch(attr, other.kind(), FieldKind::List)),
        }
    }

    /// Observable dict for the dict field `attr`.
    pub fn observable_dict(&self, attr: &str) -> Result<ObservableDict<String, Value>> {
        self.observable_dict_with(attr, FieldOptions::new())
    }

    pub fn observable_dict_with(
        &self,
        attr: &str,
        options: FieldOptions,
    ) -> Result<ObservableDict<String, Value>> {
        match self.materialize(attr, &options, FieldKind::Dict)? {
            FieldHandle::Dict(dict) => Ok(dict),
            other => Err(kind_mismatch(attr, other.kind(), FieldKind::Dict)),
        }
    }

    /// Keys of every materialized field.
    pub fn fields(&self) -> Vec<FieldKey> {
        self.inner.fields.borrow().keys()
    }

    fn materialize(
        &self,
        attr: &str,
        options: &FieldOptions,
        kind: FieldKind,
    ) -> Result<FieldHandle> {
        let sync = options.sync.unwrap_or(self.inner.default_sync);
        let key = FieldKey::new(attr, sync);
        if let Some(config) = &options.undo {
            self.inner.undo.configure(attr, config);
        }

        {
            let fields = self.inner.fields.borrow();
            if let Some(existing) = fields.kind_of(attr) {
                if existing != kind {
                    return Err(kind_mismatch(attr, existing, kind));
                }
            }
            if let Some(handle) = fields.handle(&key) {
                return Ok(handle);
            }
        }

        let value = self.inner.read_model(attr)?;
        let handle = match kind {
            FieldKind::Scalar => FieldHandle::Scalar(Observable::new(value)),
            FieldKind::List => FieldHandle::List(ObservableList::new(expect_list(attr, value)?)),
            FieldKind::Dict => FieldHandle::Dict(ObservableDict::new(expect_dict(attr, value)?)),
        };

        self.inner.undo.track(&key, handle.value());
        for &stage in Stage::for_field(sync) {
            self.attach(&key, &handle, stage);
        }

        {
            let mut fields = self.inner.fields.borrow_mut();
            fields.record_kind(attr, kind);
            match &handle {
                FieldHandle::Scalar(observable) => {
                    fields.scalars.insert(key.clone(), observable.clone());
                }
                FieldHandle::List(list) => {
                    fields.lists.insert(key.clone(), list.clone());
                }
                FieldHandle::Dict(dict) => {
                    fields.dicts.insert(key.clone(), dict.clone());
                }
            }
        }

        tracing::debug!(proxy = self.inner.id, field = %key, %kind, "materialized field");
        Ok(handle)
    }

    fn attach(&self, key: &FieldKey, handle: &FieldHandle, stage: Stage) {
        let weak: Weak<ProxyInner> = Rc::downgrade(&self.inner);
        let key = key.clone();
        handle.subscribe(Rc::new(move || match weak.upgrade() {
            Some(inner) => inner.on_field_change(&key, stage),
            None => Ok(()),
        }));
    }

    // ---- Bulk assignment and saving ----

    /// Assign several fields at once.
    ///
    /// Names already tracked as lists or dicts are replaced wholesale; every
    /// other name is set through its scalar observable. Listener failures from
    /// all assignments are returned together.
    pub fn update<I, K, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut failures = Vec::new();
        for (name, value) in values {
            match self.assign(name.as_ref(), value.into()) {
                Ok(()) => {}
                Err(ProxyError::Notify(err)) => failures.extend(err.into_failures()),
                Err(err) => return Err(err),
            }
        }
        NotifyError::check(failures).map_err(Into::into)
    }

    pub fn load_dict(&self, values: &IndexMap<String, Value>) -> Result<()> {
        self.update(values.iter().map(|(name, value)| (name.as_str(), value.clone())))
    }

    /// [`load_dict`](Self::load_dict) from a JSON object.
    pub fn load_json(&self, json: serde_json::Value) -> Result<()> {
        match json {
            serde_json::Value::Object(map) => {
                self.update(map.into_iter().map(|(name, value)| (name, Value::from(value))))
            }
            other => Err(ProxyError::InvalidArgument(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    fn assign(&self, attr: &str, value: Value) -> Result<()> {
        let tracked = self.inner.fields.borrow().lookup(attr, self.inner.default_sync);
        match tracked {
            Some((_, FieldHandle::List(list))) => list.replace(expect_list(attr, value)?)?,
            Some((_, FieldHandle::Dict(dict))) => dict.replace(expect_dict(attr, value)?)?,
            Some((_, FieldHandle::Scalar(observable))) => observable.set(value)?,
            None => self.observable(attr)?.set(value)?,
        }
        Ok(())
    }

    /// Write every tracked field into `target`, then every computed value,
    /// then the nested objects reached through path observables, and reset
    /// dirty state.
    ///
    /// A computed property named like a field overwrites that field's value in
    /// `target`. Computed values with no matching attribute on `target` are
    /// skipped; a tracked field the target lacks is an error.
    pub fn save_to(&self, target: &mut dyn Model) -> Result<()> {
        let fields = self.inner.fields.borrow().values();
        for (key, value) in fields {
            target.set_field(&key.attr, value)?;
        }
        for (name, value) in self.inner.computed.values() {
            if target.has_field(&name) {
                target.set_field(&name, value)?;
            }
        }
        self.save_nested()?;
        self.reset_dirty()
    }

    // ---- Dirty tracking ----

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.is_dirty()
    }

    /// Names of the fields changed since the last reset or save.
    pub fn dirty_fields(&self) -> IndexSet<String> {
        self.inner.dirty.fields()
    }

    /// Forget all changes. Validation state is left alone.
    pub fn reset_dirty(&self) -> Result<()> {
        self.inner.dirty.reset().map_err(Into::into)
    }

    pub fn dirty_observable(&self) -> Observable<bool> {
        self.inner.dirty.observable()
    }

    // ---- Validation ----

    /// Validate `attr` with `f`, reporting under `attr`.
    ///
    /// ```rust
    /// use observant_core::model::Record;
    /// use observant_core::ObservableProxy;
    ///
    /// let proxy = ObservableProxy::new(Record::new().with("age", 16).into_ref(), false);
    /// proxy.add_validator("age", |v| (v.as_int() < Some(18)).then_some("too young"))?;
    /// assert!(!proxy.is_valid().get());
    ///
    /// proxy.observable("age")?.set(21.into())?;
    /// assert!(proxy.is_valid().get());
    /// # Ok::<(), observant_core::ProxyError>(())
    /// ```
    pub fn add_validator<F, R>(&self, attr: &str, f: F) -> Result<()>
    where
        F: Fn(&Value) -> R + 'static,
        R: IntoValidation,
    {
        self.add_group_validator(attr, attr, f)
    }

    /// Validate `attr` with `f`, reporting under `group`.
    ///
    /// The group is validated against current values straight away.
    pub fn add_group_validator<F, R>(&self, group: &str, attr: &str, f: F) -> Result<()>
    where
        F: Fn(&Value) -> R + 'static,
        R: IntoValidation,
    {
        if group.is_empty() || attr.is_empty() {
            return Err(ProxyError::InvalidArgument(
                "validator group and attribute must not be empty".into(),
            ));
        }
        let check: Check = Rc::new(move |value: &Value| f(value).into_message());
        self.inner.validation.add(group, attr, check);
        self.inner.validate_group(group).map_err(Into::into)
    }

    pub fn is_valid(&self) -> Observable<bool> {
        self.inner.validation.is_valid()
    }

    /// Error messages by validation key.
    pub fn validation_errors(&self) -> ObservableDict<String, Vec<String>> {
        self.inner.validation.errors()
    }

    /// Messages stored under `key`, kept in step with
    /// [`validation_errors`](Self::validation_errors).
    pub fn validation_for(&self, key: &str) -> Observable<Vec<String>> {
        self.inner.validation.observable_for(key)
    }

    /// Clear the errors of `field`, or all errors. With `revalidate` the
    /// affected validators run again against current values.
    pub fn reset_validation(&self, field: Option<&str>, revalidate: bool) -> Result<()> {
        let mut failures = Vec::new();
        if let Err(err) = self.inner.validation.clear(field) {
            failures.extend(err.into_failures());
        }
        if revalidate {
            let rerun: Vec<ListenerError> = match field {
                Some(field) => self
                    .inner
                    .validation
                    .groups_for(field)
                    .iter()
                    .filter_map(|group| self.inner.validate_group(group).err())
                    .flat_map(NotifyError::into_failures)
                    .collect(),
                None => self
                    .inner
                    .validate_all()
                    .err()
                    .map(NotifyError::into_failures)
                    .unwrap_or_default(),
            };
            failures.extend(rerun);
        }
        NotifyError::check(failures).map_err(Into::into)
    }

    // ---- Undo / redo ----

    /// Step `attr` back one change. Returns false if there was nothing to
    /// undo, including for untracked fields and computed properties.
    ///
    /// The field is restored quietly: only the model write-back of a sync
    /// field happens, no listener runs.
    pub fn undo(&self, attr: &str) -> bool {
        self.step(attr, Step::Undo)
    }

    pub fn redo(&self, attr: &str) -> bool {
        self.step(attr, Step::Redo)
    }

    pub fn can_undo(&self, attr: &str) -> bool {
        self.inner
            .undo
            .resolve(attr, self.inner.default_sync)
            .is_some_and(|key| self.inner.undo.can_undo(&key))
    }

    pub fn can_redo(&self, attr: &str) -> bool {
        self.inner
            .undo
            .resolve(attr, self.inner.default_sync)
            .is_some_and(|key| self.inner.undo.can_redo(&key))
    }

    /// Override undo settings for `attr`. Settings `config` leaves unset keep
    /// their current value.
    pub fn set_undo_config(&self, attr: &str, config: UndoConfig) {
        self.inner.undo.configure(attr, &config);
    }

    fn step(&self, attr: &str, step: Step) -> bool {
        let Some(key) = self.inner.undo.resolve(attr, self.inner.default_sync) else {
            return false;
        };
        let restored = match step {
            Step::Undo => self.inner.undo.undo(&key),
            Step::Redo => self.inner.undo.redo(&key),
        };
        let Some(value) = restored else {
            return false;
        };

        let handle = self.inner.fields.borrow().handle(&key);
        if let Some(handle) = handle {
            handle.set_quiet(value.clone());
        }
        if key.sync {
            if let Err(err) = self.inner.write_model(&key.attr, value) {
                tracing::warn!(
                    proxy = self.inner.id,
                    field = %key,
                    error = %err,
                    "model write-back failed"
                );
            }
        }
        tracing::trace!(proxy = self.inner.id, field = %key, ?step, "applied history step");
        true
    }
}

fn kind_mismatch(attr: &str, existing: FieldKind, requested: FieldKind) -> ProxyError {
    ProxyError::FieldKindMismatch {
        attr: attr.to_string(),
        existing,
        requested,
    }
}

impl ProxyInner {
    fn read_model(&self, attr: &str) -> Result<Value> {
        let model = self.model.try_borrow().map_err(|_| {
            ProxyError::InvalidArgument(format!("model is mutably borrowed while reading `{attr}`"))
        })?;
        model
            .get_field(attr)
            .ok_or_else(|| ProxyError::AttributeNotFound(attr.to_string()))
    }

    fn write_model(&self, attr: &str, value: Value) -> std::result::Result<(), ListenerError> {
        let mut model = self
            .model
            .try_borrow_mut()
            .map_err(|_| ListenerError::msg(format!("model is borrowed while writing `{attr}`")))?;
        model.set_field(attr, value)?;
        Ok(())
    }

    fn field_value(&self, key: &FieldKey) -> Option<Value> {
        let handle = self.fields.borrow().handle(key)?;
        Some(handle.value())
    }

    /// Value of `name` as validators see it: a tracked field, then a
    /// computed property, then the model itself.
    fn current_value(&self, name: &str) -> Option<Value> {
        let tracked = self.fields.borrow().lookup(name, self.default_sync);
        if let Some((_, handle)) = tracked {
            return Some(handle.value());
        }
        if let Some(observable) = self.computed.observable(name) {
            return Some(observable.get());
        }
        self.model.try_borrow().ok()?.get_field(name)
    }

    fn on_field_change(
        &self,
        key: &FieldKey,
        stage: Stage,
    ) -> std::result::Result<(), ListenerError> {
        let Some(value) = self.field_value(key) else {
            return Ok(());
        };
        match stage {
            Stage::WriteBack => self.write_model(&key.attr, value),
            Stage::Dirty => Ok(self.dirty.mark(&key.attr)?),
            Stage::Validate => Ok(self.validate_attr(&key.attr, Some(&value))?),
            Stage::Undo => {
                self.undo.record(key, value);
                Ok(())
            }
        }
    }

    /// Re-run the validators of `attr`. `known` is used as the value of
    /// `attr` itself when given.
    pub(crate) fn validate_attr(
        &self,
        attr: &str,
        known: Option<&Value>,
    ) -> std::result::Result<(), NotifyError> {
        let lookup = |name: &str| match known {
            Some(value) if name == attr => Some(value.clone()),
            _ => self.current_value(name),
        };
        self.validation.validate_attr(attr, &lookup)
    }

    fn validate_group(&self, group: &str) -> std::result::Result<(), NotifyError> {
        let lookup = |name: &str| self.current_value(name);
        self.validation.validate_group(group, &lookup)
    }

    fn validate_all(&self) -> std::result::Result<(), NotifyError> {
        let lookup = |name: &str| self.current_value(name);
        self.validation.validate_all(&lookup)
    }
}

impl fmt::Debug for ObservableProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableProxy")
            .field("id", &self.inner.id)
            .field("sync", &self.inner.default_sync)
            .field("fields", &self.fields())
            .field("dirty", &self.dirty_fields())
            .finish()
    }
}
