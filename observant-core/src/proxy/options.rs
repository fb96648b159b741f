//! Proxy configuration.
//!
//! [`ProxyOptions`] carries the proxy-wide defaults, [`FieldOptions`] the
//! overrides supplied when a field is first materialized, and [`UndoConfig`]
//! the per-field undo overrides. Each undo setting resolves on its own: a
//! value set on the field wins over the proxy default.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Default bound on the number of undo steps kept per field.
pub const DEFAULT_UNDO_MAX: usize = 50;

/// Advisory conditions a proxy reports through its diagnostics callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// The proxy writes through to the model and keeps undo history, so every
    /// undo and redo also mutates the model.
    SyncWithUndo,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SyncWithUndo => f.write_str(
                "proxy created with sync and undo enabled; undo and redo will also write the model",
            ),
        }
    }
}

pub type DiagnosticHandler = Rc<dyn Fn(&Diagnostic)>;

/// Proxy-wide settings.
///
/// ```rust
/// use observant_core::ProxyOptions;
///
/// let options = ProxyOptions::new().undo(true).undo_max(10).undo_debounce_ms(250);
/// assert!(options.undo_enabled());
/// ```
#[derive(Clone)]
pub struct ProxyOptions {
    pub(crate) sync: bool,
    pub(crate) undo: bool,
    pub(crate) undo_max: Option<usize>,
    pub(crate) undo_debounce: Option<Duration>,
    pub(crate) on_diagnostic: Option<DiagnosticHandler>,
}

impl ProxyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every change straight back into the model.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Record undo history for every field.
    pub fn undo(mut self, undo: bool) -> Self {
        self.undo = undo;
        self
    }

    /// Bound the undo history per field; `None` keeps everything.
    pub fn undo_max(mut self, max: impl Into<Option<usize>>) -> Self {
        self.undo_max = max.into();
        self
    }

    /// Collapse changes closer together than `ms` into one undo step.
    pub fn undo_debounce_ms(mut self, ms: impl Into<Option<u64>>) -> Self {
        self.undo_debounce = ms.into().map(Duration::from_millis);
        self
    }

    /// Receive advisory diagnostics instead of relying on logs alone.
    pub fn on_diagnostic<F>(mut self, f: F) -> Self
    where
        F: Fn(&Diagnostic) + 'static,
    {
        self.on_diagnostic = Some(Rc::new(f));
        self
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync
    }

    pub fn undo_enabled(&self) -> bool {
        self.undo
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            sync: false,
            undo: false,
            undo_max: Some(DEFAULT_UNDO_MAX),
            undo_debounce: None,
            on_diagnostic: None,
        }
    }
}

impl fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("sync", &self.sync)
            .field("undo", &self.undo)
            .field("undo_max", &self.undo_max)
            .field("undo_debounce", &self.undo_debounce)
            .field("on_diagnostic", &self.on_diagnostic.is_some())
            .finish()
    }
}

/// Per-field undo overrides. Unset settings fall back to the proxy default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoConfig {
    pub(crate) enabled: Option<bool>,
    pub(crate) max_depth: Option<Option<usize>>,
    pub(crate) debounce: Option<Option<Duration>>,
}

impl UndoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Bound the history; `None` makes it unbounded.
    pub fn max_depth(mut self, max: impl Into<Option<usize>>) -> Self {
        self.max_depth = Some(max.into());
        self
    }

    /// Debounce window in milliseconds; `None` turns debouncing off.
    pub fn debounce_ms(mut self, ms: impl Into<Option<u64>>) -> Self {
        self.debounce = Some(ms.into().map(Duration::from_millis));
        self
    }

    /// Overlay the settings `other` specifies onto `self`.
    pub(crate) fn merge(&mut self, other: &UndoConfig) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.max_depth.is_some() {
            self.max_depth = other.max_depth;
        }
        if other.debounce.is_some() {
            self.debounce = other.debounce;
        }
    }
}

/// Overrides applied when a field is first materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub(crate) sync: Option<bool>,
    pub(crate) undo: Option<UndoConfig>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn undo(mut self, config: UndoConfig) -> Self {
        self.undo = Some(config);
        self
    }
}
