//! Error types.
//!
//! Structural and usage errors (a missing field, a missing computed property,
//! a malformed registration) surface immediately as [`ProxyError`]. Listener
//! failures are gathered per notification round into a [`NotifyError`].
//! Validator failures never appear here; they become validation messages.

use std::fmt;

use crate::proxy::FieldKind;

/// Result alias used throughout the crate.
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Errors raised by [`ObservableProxy`](crate::proxy::ObservableProxy) operations.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The wrapped model has no attribute with this name.
    #[error("attribute `{0}` not found on model")]
    AttributeNotFound(String),

    /// No computed property was registered under this name.
    #[error("no computed property named `{0}`")]
    ComputedNotFound(String),

    /// A required segment of a nested path could not be resolved.
    #[error("cannot resolve path `{path}`: {reason}")]
    PathResolution { path: String, reason: String },

    /// A registration call was made with unusable arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The attribute is already tracked as a different kind of observable.
    #[error("field `{attr}` is tracked as a {existing} observable, not a {requested} observable")]
    FieldKindMismatch {
        attr: String,
        existing: FieldKind,
        requested: FieldKind,
    },

    /// Registering a computed property would close a dependency cycle.
    #[error("circular dependency between computed properties: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// The model rejected a read or write.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// One or more listeners failed while a change was being propagated.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Errors raised by [`Model`](crate::model::Model) implementations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The model has no field with this name and cannot grow one.
    #[error("model has no field `{0}`")]
    UnknownField(String),

    /// The value cannot be stored in the field's type.
    #[error("field `{field}` expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The model refused the value for a domain reason.
    #[error("field `{field}` rejected value: {reason}")]
    Rejected { field: String, reason: String },
}

/// A failure reported by a single change listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// A write-back into the model failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A proxy operation performed by the listener failed.
    #[error(transparent)]
    Proxy(Box<ProxyError>),

    /// A listener-defined failure.
    #[error("{0}")]
    Message(String),
}

impl ListenerError {
    /// Build a listener failure from any displayable message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<ProxyError> for ListenerError {
    fn from(err: ProxyError) -> Self {
        Self::Proxy(Box::new(err))
    }
}

impl From<NotifyError> for ListenerError {
    fn from(err: NotifyError) -> Self {
        Self::Proxy(Box::new(ProxyError::Notify(err)))
    }
}

/// Failures collected from one notification round.
///
/// Every listener of the round has already run by the time this is returned.
#[derive(Debug)]
pub struct NotifyError {
    failures: Vec<ListenerError>,
}

impl NotifyError {
    /// `Ok(())` when nothing failed, otherwise the collected failures.
    pub(crate) fn check(failures: Vec<ListenerError>) -> Result<(), NotifyError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self { failures })
        }
    }

    /// The individual listener failures, in the order the listeners ran.
    pub fn failures(&self) -> &[ListenerError] {
        &self.failures
    }

    /// Consume the error and return the individual failures.
    pub fn into_failures(self) -> Vec<ListenerError> {
        self.failures
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} change listener(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_is_ok() {
        assert!(NotifyError::check(Vec::new()).is_ok());
    }

    #[test]
    fn notify_error_lists_every_failure() {
        let err = NotifyError::check(vec![
            ListenerError::msg("first"),
            ListenerError::from(ModelError::UnknownField("age".into())),
        ])
        .unwrap_err();

        assert_eq!(err.failures().len(), 2);
        assert_eq!(
            err.to_string(),
            "2 change listener(s) failed: first; model has no field `age`"
        );
    }

    #[test]
    fn circular_dependency_message_shows_cycle() {
        let err = ProxyError::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency between computed properties: a -> b -> a"
        );
    }
}
