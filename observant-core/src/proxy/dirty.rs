//! Dirty tracking: which attributes changed since the last reset or save.

use std::cell::RefCell;

use indexmap::IndexSet;

use crate::error::NotifyError;
use crate::reactive::Observable;

pub(crate) struct DirtyTracker {
    fields: RefCell<IndexSet<String>>,
    flag: Observable<bool>,
}

impl DirtyTracker {
    pub(crate) fn new() -> Self {
        Self {
            fields: RefCell::new(IndexSet::new()),
            flag: Observable::new(false),
        }
    }

    /// Add `attr`. Marking an already dirty attribute is a no-op.
    pub(crate) fn mark(&self, attr: &str) -> Result<(), NotifyError> {
        self.fields.borrow_mut().insert(attr.to_string());
        self.flag.set_if_changed(true)
    }

    pub(crate) fn reset(&self) -> Result<(), NotifyError> {
        self.fields.borrow_mut().clear();
        self.flag.set_if_changed(false)
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.fields.borrow().is_empty()
    }

    /// Dirty attribute names in the order they first changed.
    pub(crate) fn fields(&self) -> IndexSet<String> {
        self.fields.borrow().clone()
    }

    pub(crate) fn observable(&self) -> Observable<bool> {
        self.flag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn flag_follows_set_size() {
        let dirty = DirtyTracker::new();
        let flips = Rc::new(Cell::new(0));
        let f = Rc::clone(&flips);
        dirty.observable().on_change(move |_| f.set(f.get() + 1));

        dirty.mark("a").unwrap();
        dirty.mark("b").unwrap();
        dirty.mark("a").unwrap();
        assert!(dirty.is_dirty());
        assert_eq!(dirty.fields().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

        dirty.reset().unwrap();
        assert!(!dirty.is_dirty());
        assert!(!dirty.observable().get());
        assert_eq!(flips.get(), 2);
    }
}
