//! Atom Context
//!
//! The runtime cell behind an atom: its latest committed snapshot and the
//! set of retainers keeping it alive.
//!
//! # Lifecycle
//!
//! The store creates a cell on the first retain of an atom and evicts it the
//! moment its retainer set becomes empty. A cell that has been evicted may
//! still be held by a caller, but the store never hands it out again; the
//! next retain seeds a fresh cell from the atom's initial state.
//!
//! A context resolved from the store remembers its owner, so a retain taken
//! on the context itself counts toward the same lifecycle as
//! [`Store::retain`](crate::Store::retain) and evicts the cell when it is the
//! last one released.
//!
//! # Change Detection
//!
//! [`ContextCell::replace_state`] reports a change when the new snapshot is
//! a different allocation from the old one. Equal contents in a new
//! allocation still count as a change. Drafts avoid that case by returning
//! their base snapshot when nothing differs.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::atom::{ErasedState, State};
use super::ids::{AtomId, RetainerId};
use crate::store::{Release, StoreError};

/// Per-atom state cell.
pub(crate) struct ContextCell<S: State> {
    name: Arc<str>,
    inner: Mutex<CellInner<S>>,
}

struct CellInner<S> {
    /// Latest committed snapshot.
    state: Arc<S>,

    /// One handle per outstanding retain.
    retainers: HashSet<RetainerId>,
}

impl<S: State> ContextCell<S> {
    pub(crate) fn new(name: Arc<str>, state: Arc<S>) -> Self {
        Self {
            name,
            inner: Mutex::new(CellInner {
                state,
                retainers: HashSet::new(),
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.inner.lock().state)
    }

    /// Store `state` and report whether it is a different allocation.
    pub(crate) fn replace_state(&self, state: Arc<S>) -> bool {
        let mut inner = self.inner.lock();
        let changed = !Arc::ptr_eq(&inner.state, &state);
        inner.state = state;
        changed
    }

    pub(crate) fn retain(&self) -> RetainerId {
        let handle = RetainerId::new();
        self.inner.lock().retainers.insert(handle);
        handle
    }

    /// Remove one retainer. Returns `false` if it was already gone.
    pub(crate) fn release(&self, handle: RetainerId) -> bool {
        self.inner.lock().retainers.remove(&handle)
    }

    pub(crate) fn in_use(&self) -> bool {
        !self.inner.lock().retainers.is_empty()
    }

    pub(crate) fn retainer_count(&self) -> usize {
        self.inner.lock().retainers.len()
    }
}

/// Operations the store performs on cells without knowing their state type.
pub(crate) trait ErasedCell: Send + Sync {
    fn snapshot_erased(&self) -> ErasedState;

    fn replace_erased(&self, state: ErasedState) -> Result<bool, StoreError>;

    fn retain(&self) -> RetainerId;

    fn release(&self, handle: RetainerId) -> bool;

    fn in_use(&self) -> bool;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<S: State> ErasedCell for ContextCell<S> {
    fn snapshot_erased(&self) -> ErasedState {
        self.snapshot()
    }

    fn replace_erased(&self, state: ErasedState) -> Result<bool, StoreError> {
        let state = state.downcast::<S>().map_err(|_| StoreError::StateType {
            atom: self.name.to_string(),
        })?;
        Ok(self.replace_state(state))
    }

    fn retain(&self) -> RetainerId {
        ContextCell::retain(self)
    }

    fn release(&self, handle: RetainerId) -> bool {
        ContextCell::release(self, handle)
    }

    fn in_use(&self) -> bool {
        ContextCell::in_use(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The store side of a tracked cell.
pub(crate) trait CellOwner: Send + Sync {
    /// Add a retainer while no eviction can run.
    fn retain_cell(&self, cell: &Arc<dyn ErasedCell>) -> RetainerId;

    /// Remove a retainer and evict the cell if it is tracked and unused.
    fn release_cell(&self, atom: AtomId, cell: &Arc<dyn ErasedCell>, handle: RetainerId);
}

/// Typed view of an atom's runtime cell, as returned by
/// [`Store::resolve_atom`](crate::Store::resolve_atom).
///
/// Two views compare with [`AtomContext::ptr_eq`]: while an atom stays
/// retained, every resolve yields the same cell.
pub struct AtomContext<S: State> {
    cell: Arc<ContextCell<S>>,
    owner: Option<(Weak<dyn CellOwner>, AtomId)>,
}

impl<S: State> AtomContext<S> {
    pub(crate) fn from_erased(cell: Arc<dyn ErasedCell>) -> Option<Self> {
        cell.into_any()
            .downcast::<ContextCell<S>>()
            .ok()
            .map(|cell| Self { cell, owner: None })
    }

    /// Route retains on this view through the store tracking it.
    pub(crate) fn owned_by(mut self, store: Weak<dyn CellOwner>, atom: AtomId) -> Self {
        self.owner = Some((store, atom));
        self
    }

    pub(crate) fn detached(name: Arc<str>, state: Arc<S>) -> Self {
        Self {
            cell: Arc::new(ContextCell::new(name, state)),
            owner: None,
        }
    }

    /// Get the latest committed snapshot.
    pub fn snapshot(&self) -> Arc<S> {
        self.cell.snapshot()
    }

    /// Replace the snapshot. Returns `true` if `state` is a different
    /// allocation from the current one, even when the two compare equal.
    pub fn replace_state(&self, state: Arc<S>) -> bool {
        self.cell.replace_state(state)
    }

    /// Add a retainer on this cell.
    ///
    /// On a context the store tracks, this behaves like
    /// [`Store::retain`](crate::Store::retain): the cell stays tracked while
    /// the handle is live and is evicted if it was the last retainer. A
    /// detached or already evicted context is never tracked again.
    pub fn retain(&self) -> Release {
        let owner = self
            .owner
            .as_ref()
            .and_then(|(store, atom)| Some((store.upgrade()?, *atom)));

        let Some((store, atom)) = owner else {
            let handle = self.cell.retain();
            let cell: Weak<ContextCell<S>> = Arc::downgrade(&self.cell);
            return Release::new(move || {
                if let Some(cell) = cell.upgrade() {
                    cell.release(handle);
                }
            });
        };

        let cell: Arc<dyn ErasedCell> = self.cell.clone();
        let handle = store.retain_cell(&cell);
        let store = Arc::downgrade(&store);

        Release::new(move || match store.upgrade() {
            Some(store) => store.release_cell(atom, &cell, handle),
            None => {
                cell.release(handle);
            }
        })
    }

    /// Whether any retainer is outstanding.
    pub fn in_use(&self) -> bool {
        self.cell.in_use()
    }

    /// Number of outstanding retainers.
    pub fn retainer_count(&self) -> usize {
        self.cell.retainer_count()
    }

    /// Get the atom's diagnostic name.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Whether both views point at the same cell.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.cell, &other.cell)
    }
}

impl<S: State> Clone for AtomContext<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            owner: self.owner.clone(),
        }
    }
}

impl<S: State + Debug> Debug for AtomContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomContext")
            .field("name", &self.cell.name)
            .field("state", &self.snapshot())
            .field("retainers", &self.retainer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
