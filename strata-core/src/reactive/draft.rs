//! Copy-on-write drafts.
//!
//! Update handlers never see the committed snapshot mutably. They receive a
//! [`Draft`] that reads through to the snapshot and clones it only on the
//! first mutable access. When the handler returns, [`Draft::finish`] yields
//! the base snapshot itself if nothing was written or the written value is
//! equal to it, so unchanged atoms keep their identity.

use std::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::atom::State;

/// Mutable view over an immutable snapshot.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_core::Draft;
///
/// let base = Arc::new(vec![1, 2, 3]);
///
/// let untouched = Draft::new(Arc::clone(&base));
/// assert!(Arc::ptr_eq(&untouched.finish(), &base));
///
/// let mut draft = Draft::new(Arc::clone(&base));
/// draft.push(4);
/// assert_eq!(*draft.finish(), vec![1, 2, 3, 4]);
/// ```
pub struct Draft<S: State> {
    base: Arc<S>,
    working: Option<S>,
}

impl<S: State> Draft<S> {
    /// Start a draft over `base`.
    pub fn new(base: Arc<S>) -> Self {
        Self {
            base,
            working: None,
        }
    }

    /// The snapshot this draft started from.
    pub fn base(&self) -> &Arc<S> {
        &self.base
    }

    /// Overwrite the whole value.
    pub fn set(&mut self, value: S) {
        self.working = Some(value);
    }

    /// Whether the handler has taken mutable access.
    pub fn is_touched(&self) -> bool {
        self.working.is_some()
    }

    /// Produce the resulting snapshot.
    ///
    /// Returns the base when untouched or when the working copy equals it
    /// (see [`State`] for values that are not equal to themselves).
    pub fn finish(self) -> Arc<S> {
        match self.working {
            Some(value) if value != *self.base => Arc::new(value),
            _ => self.base,
        }
    }
}

impl<S: State> Deref for Draft<S> {
    type Target = S;

    fn deref(&self) -> &S {
        match &self.working {
            Some(value) => value,
            None => self.base.as_ref(),
        }
    }
}

impl<S: State> DerefMut for Draft<S> {
    fn deref_mut(&mut self) -> &mut S {
        let base = &self.base;
        self.working.get_or_insert_with(|| S::clone(base))
    }
}

impl<S: State + Debug> Debug for Draft<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("value", &**self)
            .field("touched", &self.is_touched())
            .finish()
    }
}
