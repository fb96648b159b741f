//! Model Reflection
//!
//! The proxy reads and writes the wrapped object by field name through the
//! [`Model`] trait, exchanging dynamically typed [`Value`]s. Plain structs get
//! an implementation from [`impl_model!`](crate::impl_model); [`Record`] is a
//! ready-made model whose shape is decided at runtime.
//!
//! # Example
//!
//! ```rust
//! use observant_core::impl_model;
//! use observant_core::model::{Model, Value};
//!
//! #[derive(Default)]
//! struct User {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl_model!(User { name, age });
//!
//! let mut user = User::default();
//! user.set_field("age", Value::Int(30)).unwrap();
//! assert_eq!(user.age, 30);
//! assert_eq!(user.get_field("name"), Some(Value::from("")));
//! assert!(user.get_field("email").is_none());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::ModelError;

/// An object whose fields can be read and written by name.
pub trait Model {
    /// Current value of `name`, or `None` if the model has no such field.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Write `value` into `name`.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ModelError>;

    /// Names of every field, in declaration order.
    fn field_names(&self) -> Vec<String>;

    fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }
}

/// Shared handle to a model. The proxy borrows through it and never owns the
/// model's lifecycle.
pub type ModelRef = Rc<RefCell<dyn Model>>;

/// Wrap a model in a shared handle.
pub fn model_ref<M: Model + 'static>(model: M) -> ModelRef {
    Rc::new(RefCell::new(model))
}

/// A dynamically typed field value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// A nested model, compared by identity.
    Object(ModelRef),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as a float; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ModelRef> {
        match self {
            Value::Object(model) => Some(model),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Dict(entries) => f.debug_tuple("Dict").field(entries).finish(),
            Value::Object(model) => match model.try_borrow() {
                Ok(model) => f
                    .debug_tuple("Object")
                    .field(&model.field_names())
                    .finish(),
                Err(_) => f.write_str("Object(<borrowed>)"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Object(_) => f.write_str("<object>"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(entries: IndexMap<String, T>) -> Self {
        Value::Dict(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl From<ModelRef> for Value {
    fn from(model: ModelRef) -> Self {
        Value::Object(model)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(model_ref(record))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::None, Value::Float),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Conversion from a [`Value`] back into a typed field.
pub trait FromValue: Sized {
    /// Name of the expected [`Value`] kind, for error messages.
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> Option<Self>;
}

/// Convert `value` for field `field`, reporting a type mismatch on failure.
pub fn from_field_value<T: FromValue>(field: &str, value: Value) -> Result<T, ModelError> {
    let found = value.kind_name();
    T::from_value(value).ok_or_else(|| ModelError::TypeMismatch {
        field: field.to_string(),
        expected: T::EXPECTED,
        found,
    })
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        value.as_int().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for u32 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        value.as_int().and_then(|i| u32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: Value) -> Option<Self> {
        value.as_float()
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "str";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const EXPECTED: &'static str = "list";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for IndexMap<String, T> {
    const EXPECTED: &'static str = "dict";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Dict(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::None => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for ModelRef {
    const EXPECTED: &'static str = "object";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(model) => Some(model),
            _ => None,
        }
    }
}

/// Implement [`Model`] for a struct by listing its fields.
///
/// Every listed field must be `Clone`, convertible into [`Value`], and
/// implement [`FromValue`].
#[macro_export]
macro_rules! impl_model {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::model::Model for $ty {
            fn get_field(&self, name: &str) -> ::std::option::Option<$crate::model::Value> {
                match name {
                    $(stringify!($field) => ::std::option::Option::Some(
                        $crate::model::Value::from(::std::clone::Clone::clone(&self.$field)),
                    ),)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::model::Value,
            ) -> ::std::result::Result<(), $crate::ModelError> {
                match name {
                    $(stringify!($field) => {
                        self.$field = $crate::model::from_field_value(name, value)?;
                        ::std::result::Result::Ok(())
                    })*
                    _ => ::std::result::Result::Err($crate::ModelError::UnknownField(
                        ::std::string::ToString::to_string(name),
                    )),
                }
            }

            fn field_names(&self) -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![$(::std::string::ToString::to_string(stringify!($field))),*]
            }
        }
    };
}

/// A model with a runtime-defined, insertion-ordered set of fields.
///
/// Writing an unknown name adds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Move the record behind a shared handle.
    pub fn into_ref(self) -> Rc<RefCell<Record>> {
        Rc::new(RefCell::new(self))
    }
}

impl Model for Record {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ModelError> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
