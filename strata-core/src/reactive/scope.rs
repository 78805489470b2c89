//! Commit Scope
//!
//! Tracks which stores are in the middle of a commit on the current thread.
//! A commit enters a scope for its store before running any handler and
//! leaves it after the last notification. Entering a scope for a store that
//! is already on the stack means the commit is re-entrant.
//!
//! # Implementation
//!
//! A thread-local stack of store ids. The guard pops its entry when dropped,
//! so the stack stays balanced even if a handler panics.

use std::cell::RefCell;

use super::ids::StoreId;

thread_local! {
    static COMMIT_STACK: RefCell<Vec<StoreId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that marks a store as committing on this thread.
#[derive(Debug)]
pub(crate) struct CommitScope {
    store: StoreId,
}

impl CommitScope {
    /// Enter a commit for `store`.
    ///
    /// Returns `None` if a commit for the same store is already running on
    /// this thread.
    pub(crate) fn enter(store: StoreId) -> Option<Self> {
        COMMIT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&store) {
                return None;
            }
            stack.push(store);
            Some(Self { store })
        })
    }

    /// Whether `store` is committing on this thread.
    pub(crate) fn is_active(store: StoreId) -> bool {
        COMMIT_STACK.with(|stack| stack.borrow().contains(&store))
    }
}

impl Drop for CommitScope {
    fn drop(&mut self) {
        COMMIT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(store) = popped {
                debug_assert_eq!(
                    store, self.store,
                    "CommitScope mismatch: expected {:?}, got {:?}",
                    self.store, store
                );
            }
        });
    }
}
