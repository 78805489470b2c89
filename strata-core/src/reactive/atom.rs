//! Atom Definitions
//!
//! An atom is a named piece of state plus its initial value. Definitions are
//! created once by application code and shared by cloning; the store keys
//! every lookup on the atom's [`AtomId`], never on its name.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use super::context::{ContextCell, ErasedCell};
use super::ids::AtomId;
use crate::store::StoreError;

/// Bound satisfied by every type that can live in an atom.
///
/// `PartialEq` lets a draft that was written back to an equal value keep the
/// identity of its base snapshot.
///
/// A state that is not equal to itself, such as one holding an `f64::NAN`,
/// never compares equal to its base. Every handler that mutably touches it
/// then produces a new snapshot and notifies subscribers, even when nothing
/// was changed. Wrap such fields in a type whose `PartialEq` is reflexive
/// if that matters.
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Type-erased immutable snapshot.
#[doc(hidden)]
pub type ErasedState = Arc<dyn Any + Send + Sync>;

/// Upcast a typed snapshot into its erased form.
pub(crate) fn erase<S: State>(state: Arc<S>) -> ErasedState {
    state
}

/// A named piece of state and its initial value.
///
/// # Example
///
/// ```rust
/// use strata_core::Atom;
///
/// let counter = Atom::new("counter", 0);
/// assert_eq!(**counter.initial_state(), 0);
/// ```
pub struct Atom<S: State> {
    inner: Arc<AtomInner<S>>,
}

struct AtomInner<S: State> {
    id: AtomId,
    name: Arc<str>,
    initial: Arc<S>,
}

impl<S: State> Atom<S> {
    /// Define a new atom. Each call yields a distinct identity, even when
    /// names collide.
    pub fn new(name: impl Into<Arc<str>>, initial: S) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                id: AtomId::new(),
                name: name.into(),
                initial: Arc::new(initial),
            }),
        }
    }

    /// Get the atom's identity.
    pub fn id(&self) -> AtomId {
        self.inner.id
    }

    /// Get the diagnostic name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the seed value.
    pub fn initial_state(&self) -> &Arc<S> {
        &self.inner.initial
    }

    /// Erased handle used by the store's maps.
    pub(crate) fn key(&self) -> AtomKey {
        AtomKey {
            id: self.inner.id,
            name: Arc::clone(&self.inner.name),
            seed: Arc::clone(&self.inner) as Arc<dyn CellSeed>,
        }
    }

    /// Recover a typed snapshot from the erased one the store holds.
    pub(crate) fn thaw(&self, state: Option<&ErasedState>) -> Result<Arc<S>, StoreError> {
        state
            .and_then(|state| Arc::clone(state).downcast::<S>().ok())
            .ok_or_else(|| StoreError::StateType {
                atom: self.name().to_string(),
            })
    }
}

impl<S: State> Clone for Atom<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State + Debug> Debug for Atom<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("initial", &self.inner.initial)
            .finish()
    }
}

/// Creates fresh context cells seeded at an atom's initial state.
pub(crate) trait CellSeed: Send + Sync {
    fn fresh_cell(&self) -> Arc<dyn ErasedCell>;
}

impl<S: State> CellSeed for AtomInner<S> {
    fn fresh_cell(&self) -> Arc<dyn ErasedCell> {
        Arc::new(ContextCell::new(
            Arc::clone(&self.name),
            Arc::clone(&self.initial),
        ))
    }
}

/// An atom with its state type erased.
#[doc(hidden)]
#[derive(Clone)]
pub struct AtomKey {
    pub(crate) id: AtomId,
    pub(crate) name: Arc<str>,
    seed: Arc<dyn CellSeed>,
}

impl AtomKey {
    pub(crate) fn fresh_cell(&self) -> Arc<dyn ErasedCell> {
        self.seed.fresh_cell()
    }
}

impl Debug for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
