//! Recompute Context
//!
//! Tracks which computed properties are currently being evaluated on this
//! thread. A computed property whose compute function (directly or through
//! listeners it triggers) asks for its own recomputation would otherwise
//! recurse without bound.
//!
//! # Implementation
//!
//! We use a thread-local stack of `(owner, name)` pairs. Entering pushes the
//! pair; dropping the returned guard pops it. Entering a pair that is already
//! on the stack is refused.

use std::cell::RefCell;

thread_local! {
    static RECOMPUTE_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContextEntry {
    /// Identity of the proxy that owns the computed property.
    owner: u64,
    name: String,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the compute function panics.
#[derive(Debug)]
pub struct RecomputeContext {
    entry: ContextEntry,
}

impl RecomputeContext {
    /// Enter the context for computed property `name` of `owner`.
    ///
    /// Returns `None` when that property is already being recomputed further
    /// up the stack.
    pub fn enter(owner: u64, name: &str) -> Option<Self> {
        let entry = ContextEntry {
            owner,
            name: name.to_string(),
        };
        RECOMPUTE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&entry) {
                return None;
            }
            stack.push(entry.clone());
            Some(Self { entry })
        })
    }

    /// Number of nested recomputations currently running.
    pub fn depth() -> usize {
        RECOMPUTE_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for RecomputeContext {
    fn drop(&mut self) {
        RECOMPUTE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry, self.entry,
                    "RecomputeContext mismatch: expected {:?}, got {:?}",
                    self.entry, entry
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_cleaned_up_on_drop() {
        assert_eq!(RecomputeContext::depth(), 0);

        {
            let _ctx = RecomputeContext::enter(1, "total");
            assert_eq!(RecomputeContext::depth(), 1);
        }

        assert_eq!(RecomputeContext::depth(), 0);
    }

    #[test]
    fn reentering_same_property_is_refused() {
        let outer = RecomputeContext::enter(7, "total");
        assert!(outer.is_some());
        assert!(RecomputeContext::enter(7, "total").is_none());

        // Another owner or another name is fine.
        let other_owner = RecomputeContext::enter(8, "total");
        assert!(other_owner.is_some());
        drop(other_owner);
        let other_name = RecomputeContext::enter(7, "count");
        assert!(other_name.is_some());
        drop(other_name);

        assert_eq!(RecomputeContext::depth(), 1);
        drop(outer);
        assert_eq!(RecomputeContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        {
            let _a = RecomputeContext::enter(1, "a");
            {
                let _b = RecomputeContext::enter(1, "b");
                assert_eq!(RecomputeContext::depth(), 2);
            }
            assert_eq!(RecomputeContext::depth(), 1);
        }
        assert_eq!(RecomputeContext::depth(), 0);
    }
}
