//! Undo/redo history.
//!
//! Each tracked field owns an [`UndoStack`] holding prior values. The stack
//! also remembers the field's latest value, so a change listener only has to
//! report the new value: the previous one is already known.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::key::FieldKey;
use super::options::{ProxyOptions, UndoConfig};
use crate::model::Value;

/// Undo settings after resolving overrides against the proxy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UndoSettings {
    pub(crate) enabled: bool,
    pub(crate) max_depth: Option<usize>,
    pub(crate) debounce: Option<Duration>,
}

/// Undo/redo history of one field.
#[derive(Debug)]
pub(crate) struct UndoStack {
    undo: VecDeque<Value>,
    redo: VecDeque<Value>,
    /// The field's value after the most recent change or history step.
    current: Value,
    /// When the last recorded change happened; `None` closes the debounce
    /// window.
    last_change: Option<Instant>,
}

impl UndoStack {
    pub(crate) fn new(current: Value) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            current,
            last_change: None,
        }
    }

    /// Record a change to `value` made at `now`.
    ///
    /// Returns true if a new undo step was pushed.
    pub(crate) fn record(&mut self, value: Value, now: Instant, settings: UndoSettings) -> bool {
        if !settings.enabled {
            self.current = value;
            return false;
        }
        if value == self.current {
            return false;
        }

        let within_window = match (settings.debounce, self.last_change) {
            (Some(window), Some(last)) => now.saturating_duration_since(last) < window,
            _ => false,
        };
        self.last_change = Some(now);
        self.redo.clear();

        if within_window && !self.undo.is_empty() {
            // Amend: the step already on the stack keeps the pre-burst value.
            self.current = value;
            tracing::trace!(depth = self.undo.len(), "amended undo step");
            return false;
        }

        let previous = std::mem::replace(&mut self.current, value);
        self.undo.push_back(previous);
        if let Some(max) = settings.max_depth {
            while self.undo.len() > max {
                self.undo.pop_front();
            }
        }
        tracing::trace!(depth = self.undo.len(), "pushed undo step");
        true
    }

    /// Step back. Returns the value to restore.
    pub(crate) fn undo(&mut self) -> Option<Value> {
        let value = self.undo.pop_back()?;
        let current = std::mem::replace(&mut self.current, value.clone());
        self.redo.push_back(current);
        self.last_change = None;
        Some(value)
    }

    /// Step forward again. Returns the value to restore.
    pub(crate) fn redo(&mut self) -> Option<Value> {
        let value = self.redo.pop_back()?;
        let current = std::mem::replace(&mut self.current, value.clone());
        self.undo.push_back(current);
        self.last_change = None;
        Some(value)
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

/// History for every tracked field of one proxy.
pub(crate) struct UndoEngine {
    defaults: UndoSettings,
    overrides: RefCell<HashMap<String, UndoConfig>>,
    stacks: RefCell<HashMap<FieldKey, UndoStack>>,
}

impl UndoEngine {
    pub(crate) fn new(options: &ProxyOptions) -> Self {
        Self {
            defaults: UndoSettings {
                enabled: options.undo,
                max_depth: options.undo_max,
                debounce: options.undo_debounce,
            },
            overrides: RefCell::new(HashMap::new()),
            stacks: RefCell::new(HashMap::new()),
        }
    }

    /// Overlay `config` onto the overrides for `attr`.
    pub(crate) fn configure(&self, attr: &str, config: &UndoConfig) {
        self.overrides
            .borrow_mut()
            .entry(attr.to_string())
            .or_default()
            .merge(config);
    }

    pub(crate) fn settings_for(&self, attr: &str) -> UndoSettings {
        let overrides = self.overrides.borrow();
        let config = overrides.get(attr);
        UndoSettings {
            enabled: config
                .and_then(|c| c.enabled)
                .unwrap_or(self.defaults.enabled),
            max_depth: config
                .and_then(|c| c.max_depth)
                .unwrap_or(self.defaults.max_depth),
            debounce: config
                .and_then(|c| c.debounce)
                .unwrap_or(self.defaults.debounce),
        }
    }

    /// Start tracking `key` at `value`.
    pub(crate) fn track(&self, key: &FieldKey, value: Value) {
        self.stacks
            .borrow_mut()
            .entry(key.clone())
            .or_insert_with(|| UndoStack::new(value));
    }

    pub(crate) fn record(&self, key: &FieldKey, value: Value) {
        let settings = self.settings_for(&key.attr);
        if let Some(stack) = self.stacks.borrow_mut().get_mut(key) {
            stack.record(value, Instant::now(), settings);
        }
    }

    pub(crate) fn undo(&self, key: &FieldKey) -> Option<Value> {
        self.stacks.borrow_mut().get_mut(key)?.undo()
    }

    pub(crate) fn redo(&self, key: &FieldKey) -> Option<Value> {
        self.stacks.borrow_mut().get_mut(key)?.redo()
    }

    pub(crate) fn can_undo(&self, key: &FieldKey) -> bool {
        self.stacks
            .borrow()
            .get(key)
            .is_some_and(UndoStack::can_undo)
    }

    pub(crate) fn can_redo(&self, key: &FieldKey) -> bool {
        self.stacks
            .borrow()
            .get(key)
            .is_some_and(UndoStack::can_redo)
    }

    /// The key whose history `attr` refers to: the `preferred` sync variant
    /// if it is tracked, else the other one.
    pub(crate) fn resolve(&self, attr: &str, preferred: bool) -> Option<FieldKey> {
        let stacks = self.stacks.borrow();
        [preferred, !preferred]
            .into_iter()
            .map(|sync| FieldKey::new(attr, sync))
            .find(|key| stacks.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ON: UndoSettings = UndoSettings {
        enabled: true,
        max_depth: None,
        debounce: None,
    };

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn undo_then_redo_round_trip() {
        let mut stack = UndoStack::new(int(0));
        let now = Instant::now();

        assert!(stack.record(int(1), now, ON));
        assert_eq!(stack.undo(), Some(int(0)));
        assert!(stack.can_redo());
        assert_eq!(stack.redo(), Some(int(1)));
        assert!(!stack.can_redo());
        assert_eq!(stack.undo(), Some(int(0)));
        assert_eq!(stack.undo(), None);
    }

    #[test]
    fn new_change_clears_redo() {
        let mut stack = UndoStack::new(int(0));
        let now = Instant::now();

        stack.record(int(1), now, ON);
        stack.undo();
        assert!(stack.can_redo());

        stack.record(int(2), now, ON);
        assert!(!stack.can_redo());
    }

    #[test]
    fn equal_value_records_nothing() {
        let mut stack = UndoStack::new(int(3));
        assert!(!stack.record(int(3), Instant::now(), ON));
        assert!(!stack.can_undo());
    }

    #[test]
    fn max_depth_evicts_oldest() {
        let mut stack = UndoStack::new(int(0));
        let now = Instant::now();
        let bounded = UndoSettings {
            max_depth: Some(2),
            ..ON
        };

        for i in 1..=3 {
            stack.record(int(i), now, bounded);
        }

        assert_eq!(stack.undo(), Some(int(2)));
        assert_eq!(stack.undo(), Some(int(1)));
        assert_eq!(stack.undo(), None);
    }

    #[test]
    fn debounce_window_slides() {
        let mut stack = UndoStack::new(int(0));
        let start = Instant::now();
        let debounced = UndoSettings {
            debounce: Some(Duration::from_millis(100)),
            ..ON
        };

        assert!(stack.record(int(1), start, debounced));
        assert!(!stack.record(int(2), start + Duration::from_millis(60), debounced));
        // 120ms after the first change but only 60ms after the previous one.
        assert!(!stack.record(int(3), start + Duration::from_millis(120), debounced));
        assert!(stack.record(int(4), start + Duration::from_millis(300), debounced));

        assert_eq!(stack.undo(), Some(int(3)));
        assert_eq!(stack.undo(), Some(int(0)));
        assert!(!stack.can_undo());
    }

    #[test]
    fn undo_closes_debounce_window() {
        let mut stack = UndoStack::new(int(0));
        let start = Instant::now();
        let debounced = UndoSettings {
            debounce: Some(Duration::from_secs(60)),
            ..ON
        };

        stack.record(int(1), start, debounced);
        stack.undo();
        assert!(stack.record(int(2), start, debounced));
        assert!(stack.record(int(3), start + Duration::from_secs(120), debounced));
    }

    #[test]
    fn disabled_tracks_value_without_history() {
        let mut stack = UndoStack::new(int(0));
        let off = UndoSettings {
            enabled: false,
            ..ON
        };

        assert!(!stack.record(int(1), Instant::now(), off));
        assert!(!stack.can_undo());
        assert!(stack.record(int(2), Instant::now(), ON));
        assert_eq!(stack.undo(), Some(int(1)));
    }

    #[test]
    fn field_overrides_win_per_setting() {
        let engine = UndoEngine::new(&ProxyOptions::new().undo(true).undo_max(50));
        engine.configure("name", &UndoConfig::new().max_depth(3));
        engine.configure("name", &UndoConfig::new().debounce_ms(10));

        let settings = engine.settings_for("name");
        assert!(settings.enabled);
        assert_eq!(settings.max_depth, Some(3));
        assert_eq!(settings.debounce, Some(Duration::from_millis(10)));

        assert_eq!(engine.settings_for("other").max_depth, Some(50));
    }

    #[test]
    fn resolve_falls_back_to_other_sync_variant() {
        let engine = UndoEngine::new(&ProxyOptions::new());
        engine.track(&FieldKey::new("a", true), int(0));

        assert_eq!(engine.resolve("a", false), Some(FieldKey::new("a", true)));
        assert_eq!(engine.resolve("b", false), None);
        assert!(!engine.can_undo(&FieldKey::new("b", false)));
    }
}
