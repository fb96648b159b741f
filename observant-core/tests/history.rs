//! Integration tests for undo and redo.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use observant_core::model::{Record, Value};
use observant_core::{Diagnostic, FieldOptions, ObservableProxy, ProxyOptions, UndoConfig};

fn profile() -> Rc<RefCell<Record>> {
    let mut preferences = IndexMap::new();
    preferences.insert("theme".to_string(), Value::from("dark"));
    Record::new()
        .with("username", "first")
        .with("age", 30)
        .with("tags", vec!["a"])
        .with("preferences", preferences)
        .into_ref()
}

fn with_undo() -> ObservableProxy {
    ObservableProxy::with_options(profile(), ProxyOptions::new().undo(true))
}

fn set(proxy: &ObservableProxy, attr: &str, value: impl Into<Value>) {
    proxy.observable(attr).unwrap().set(value.into()).unwrap();
}

fn get(proxy: &ObservableProxy, attr: &str) -> Value {
    proxy.observable(attr).unwrap().get()
}

/// History is off unless asked for.
#[test]
fn undo_disabled_by_default() {
    let proxy = ObservableProxy::new(profile(), false);
    set(&proxy, "username", "second");

    assert!(!proxy.can_undo("username"));
    assert!(!proxy.undo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("second"));
}

/// Single and repeated undo walk back through the history.
#[test]
fn scalar_undo_steps_back() {
    let proxy = with_undo();
    set(&proxy, "username", "second");
    set(&proxy, "username", "third");

    assert!(proxy.undo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("second"));
    assert!(proxy.undo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("first"));
    assert!(!proxy.undo("username"));
}

/// Redo re-applies what undo took back; a new change drops the redo stack.
#[test]
fn redo_and_redo_invalidation() {
    let proxy = with_undo();
    set(&proxy, "username", "modified");

    proxy.undo("username");
    assert!(proxy.can_redo("username"));
    assert!(proxy.redo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("modified"));

    proxy.undo("username");
    set(&proxy, "username", "new_value");
    assert!(!proxy.can_redo("username"));
    assert!(!proxy.redo("username"));
}

/// Flags follow the stacks.
#[test]
fn can_undo_and_can_redo_flags() {
    let proxy = with_undo();
    proxy.observable("age").unwrap();
    assert!(!proxy.can_undo("age"));
    assert!(!proxy.can_redo("age"));

    set(&proxy, "age", 31);
    assert!(proxy.can_undo("age"));
    assert!(!proxy.can_redo("age"));

    proxy.undo("age");
    assert!(!proxy.can_undo("age"));
    assert!(proxy.can_redo("age"));
}

/// Changes inside the debounce window collapse into one step.
#[test]
fn debounce_collapses_bursts() {
    let proxy = ObservableProxy::with_options(
        profile(),
        ProxyOptions::new().undo(true).undo_debounce_ms(500),
    );
    set(&proxy, "username", "change1");
    set(&proxy, "username", "change2");

    assert!(proxy.undo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("first"));
    assert!(!proxy.can_undo("username"));
}

/// A change after the window has passed starts a new step.
#[test]
fn debounce_window_expires() {
    let proxy = ObservableProxy::with_options(
        profile(),
        ProxyOptions::new().undo(true).undo_debounce_ms(20),
    );
    set(&proxy, "username", "change1");
    thread::sleep(Duration::from_millis(60));
    set(&proxy, "username", "change2");

    proxy.undo("username");
    assert_eq!(get(&proxy, "username"), Value::from("change1"));
    proxy.undo("username");
    assert_eq!(get(&proxy, "username"), Value::from("first"));
}

/// List mutations are undone as whole-list snapshots.
#[test]
fn list_undo_and_redo() {
    let proxy = with_undo();
    let tags = proxy.observable_list("tags").unwrap();

    tags.push("b".into()).unwrap();
    tags.remove_item(&"a".into()).unwrap();
    tags.clear().unwrap();
    assert!(tags.is_empty());

    proxy.undo("tags");
    assert_eq!(tags.to_vec(), vec![Value::from("b")]);
    proxy.undo("tags");
    assert_eq!(tags.to_vec(), vec![Value::from("a"), Value::from("b")]);
    proxy.undo("tags");
    assert_eq!(tags.to_vec(), vec![Value::from("a")]);

    proxy.redo("tags");
    assert_eq!(tags.len(), 2);
}

/// Dict mutations are undone as whole-dict snapshots.
#[test]
fn dict_undo_and_redo() {
    let proxy = with_undo();
    let prefs = proxy.observable_dict("preferences").unwrap();

    prefs.insert("lang".into(), "en".into()).unwrap();
    prefs.remove(&"theme".to_string()).unwrap();

    proxy.undo("preferences");
    assert_eq!(prefs.keys(), vec!["theme", "lang"]);
    proxy.undo("preferences");
    assert_eq!(prefs.keys(), vec!["theme"]);
    proxy.redo("preferences");
    assert_eq!(prefs.get(&"lang".to_string()), Some(Value::from("en")));
}

/// The oldest steps fall off once the bound is reached.
#[test]
fn max_depth_bounds_history() {
    let proxy =
        ObservableProxy::with_options(profile(), ProxyOptions::new().undo(true).undo_max(2));
    for i in 1..=3 {
        set(&proxy, "age", i);
    }

    proxy.undo("age");
    proxy.undo("age");
    assert_eq!(get(&proxy, "age"), Value::Int(1));
    assert!(!proxy.can_undo("age"));
    assert!(!proxy.undo("age"));
    assert_eq!(get(&proxy, "age"), Value::Int(1));
}

/// A per-field config set before the field exists applies once it does.
#[test]
fn set_undo_config_before_field_creation() {
    let proxy = ObservableProxy::new(profile(), false);
    proxy.set_undo_config("age", UndoConfig::new().enabled(true).max_depth(1));

    set(&proxy, "age", 1);
    set(&proxy, "age", 2);
    set(&proxy, "username", "untracked");

    assert!(proxy.undo("age"));
    assert_eq!(get(&proxy, "age"), Value::Int(1));
    assert!(!proxy.can_undo("age"));
    assert!(!proxy.can_undo("username"));
}

/// Enabling history later starts from the field's current value.
#[test]
fn set_undo_config_after_field_creation() {
    let proxy = ObservableProxy::new(profile(), false);
    set(&proxy, "age", 40);

    proxy.set_undo_config("age", UndoConfig::new().enabled(true));
    set(&proxy, "age", 41);

    assert!(proxy.undo("age"));
    assert_eq!(get(&proxy, "age"), Value::Int(40));
    assert!(!proxy.can_undo("age"));
}

/// Undo settings can ride along with the first request for a field.
#[test]
fn undo_override_on_creation() {
    let proxy = with_undo();
    let age = proxy
        .observable_with(
            "age",
            FieldOptions::new().undo(UndoConfig::new().max_depth(1)),
        )
        .unwrap();
    age.set(Value::Int(1)).unwrap();
    age.set(Value::Int(2)).unwrap();

    assert!(proxy.undo("age"));
    assert!(!proxy.undo("age"));
    assert_eq!(age.get(), Value::Int(1));
}

/// Undo on unknown, untracked or computed names is a quiet no-op.
#[test]
fn undo_on_unknown_targets_does_nothing() {
    let proxy = with_undo();
    proxy
        .register_computed(
            "double",
            |p| Ok(p.observable("age")?.get().as_int().unwrap_or(0) * 2),
            ["age"],
        )
        .unwrap();
    set(&proxy, "age", 4);

    for name in ["nope", "username", "double"] {
        assert!(!proxy.undo(name));
        assert!(!proxy.redo(name));
        assert!(!proxy.can_undo(name));
        assert!(!proxy.can_redo(name));
    }
}

/// Undo restores the value without running listeners or marking dirty.
#[test]
fn undo_is_quiet() {
    let proxy = with_undo();
    let age = proxy.observable("age").unwrap();
    proxy
        .register_computed(
            "next",
            |p| Ok(p.observable("age")?.get().as_int().unwrap_or(0) + 1),
            ["age"],
        )
        .unwrap();
    age.set(Value::Int(50)).unwrap();
    proxy.reset_dirty().unwrap();

    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    age.on_change(move |_| c.set(c.get() + 1));

    assert!(proxy.undo("age"));
    assert_eq!(age.get(), Value::Int(30));
    assert_eq!(calls.get(), 0);
    assert!(!proxy.is_dirty());
    // Computed properties are not refreshed by undo.
    assert_eq!(proxy.computed("next").unwrap().get(), Value::Int(51));
}

/// Undo after a save keeps working.
#[test]
fn undo_after_save() {
    let model = profile();
    let proxy = ObservableProxy::with_options(model.clone(), ProxyOptions::new().undo(true));
    set(&proxy, "username", "saved");
    proxy.save_to(&mut *model.borrow_mut()).unwrap();

    assert!(proxy.undo("username"));
    assert_eq!(get(&proxy, "username"), Value::from("first"));
    assert_eq!(model.borrow().get("username"), Some(&Value::from("saved")));
}

/// With sync on, undo and redo also write the model.
#[test]
fn sync_undo_writes_model() {
    let model = profile();
    let proxy = ObservableProxy::with_options(
        model.clone(),
        ProxyOptions::new().sync(true).undo(true),
    );

    set(&proxy, "username", "second");
    let tags = proxy.observable_list("tags").unwrap();
    tags.push("b".into()).unwrap();
    let prefs = proxy.observable_dict("preferences").unwrap();
    prefs.insert("lang".into(), "en".into()).unwrap();

    proxy.undo("username");
    proxy.undo("tags");
    proxy.undo("preferences");
    {
        let model = model.borrow();
        assert_eq!(model.get("username"), Some(&Value::from("first")));
        assert_eq!(model.get("tags"), Some(&Value::from(vec!["a"])));
        assert_eq!(
            model.get("preferences").and_then(Value::as_dict).map(IndexMap::len),
            Some(1)
        );
    }

    proxy.redo("username");
    assert_eq!(model.borrow().get("username"), Some(&Value::from("second")));
}

/// Sync plus undo is reported once through the diagnostics hook.
#[test]
fn sync_and_undo_reports_diagnostic() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let proxy = ObservableProxy::with_options(
        profile(),
        ProxyOptions::new()
            .sync(true)
            .undo(true)
            .on_diagnostic(move |d| s.borrow_mut().push(*d)),
    );
    set(&proxy, "age", 1);
    proxy.undo("age");

    assert_eq!(*seen.borrow(), vec![Diagnostic::SyncWithUndo]);
}
