//! The Store
//!
//! The store is the registry that ties atoms, updates and subscribers
//! together. It owns every atom context, every update manager and every
//! subscriber set; callers only ever hold [`Release`] handles.
//!
//! # Commit
//!
//! [`Store::commit`] runs to completion before it returns:
//!
//! 1. Look up the update manager for the event's signal tag. No manager
//!    means no handlers, and the commit is a silent no-op.
//! 2. For each registered update, in registration order: snapshot its
//!    sources, run the handler over drafts of them, then replace every
//!    source's state and record the atoms whose snapshot changed.
//! 3. After all updates ran, notify each subscriber of each changed atom
//!    exactly once. Atoms no one retains have no subscribers to notify.
//!
//! # Locking
//!
//! Each map sits behind its own mutex. Retain and release are single
//! critical sections, so creation-on-first-use and eviction-at-zero cannot
//! interleave. No map lock is held while a handler or subscriber runs.
//!
//! Commits are serialized per store: a commit from another thread waits
//! until the running one, notifications and queued events included, has
//! returned. A handler or subscriber must therefore not block on another
//! thread that commits to the same store.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::config::{ReentrancyPolicy, StoreConfig};
use super::error::{Result, StoreError};
use super::manager::UpdateManager;
use super::release::Release;
use super::update::{ErasedUpdate, Update};
use crate::reactive::{
    Atom, AtomContext, AtomId, AtomKey, CellOwner, CommitScope, ErasedCell, Event, Payload,
    RetainerId, Signal, SignalTag, Sources, State, StoreId, Subscriber, SubscriberId, UpdateId,
};

/// A reactive state container.
///
/// `Store` is a cheap handle: clones share the same registry.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use strata_core::{Atom, Signal, Store, Update};
///
/// let counter = Atom::new("counter", 0);
/// let increment = Signal::<i32>::new("counter.increment");
///
/// let store = Store::new();
/// let _retainer = store.retain(&counter);
/// let _update = store
///     .register_update(Update::new(&increment, counter.clone(), |count, by| **count += by))
///     .unwrap();
///
/// let renders = Arc::new(AtomicUsize::new(0));
/// let renders_clone = renders.clone();
/// let _watch = store.watch(&counter, move || {
///     renders_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// store.commit(increment.create(2)).unwrap();
/// assert_eq!(*store.resolve_atom(&counter).snapshot(), 2);
/// assert_eq!(renders.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    id: StoreId,
    config: StoreConfig,

    /// Contexts of retained atoms.
    atoms: Mutex<HashMap<AtomId, Arc<dyn ErasedCell>>>,

    /// Update managers by signal tag.
    updates: Mutex<HashMap<SignalTag, UpdateManager>>,

    /// Subscribers by atom, in subscription order.
    watchers: Mutex<HashMap<AtomId, IndexMap<SubscriberId, Subscriber>>>,

    /// Events deferred by re-entrant commits.
    pending: Mutex<VecDeque<PendingEvent>>,

    /// Held for the whole of an outermost commit.
    committing: Mutex<()>,
}

/// An event with its payload erased, waiting to be applied.
struct PendingEvent {
    signal: SignalTag,
    name: Arc<str>,
    data: Box<dyn Any + Send + Sync>,
}

impl PendingEvent {
    fn new<D: Payload>(event: Event<D>) -> Self {
        let (signal, name, data) = event.into_parts();
        Self {
            signal,
            name,
            data: Box::new(data),
        }
    }
}

impl Store {
    /// Create a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let id = StoreId::new();
        debug!(store = %id, ?config, "created store");

        Self {
            inner: Arc::new(StoreInner {
                id,
                config,
                atoms: Mutex::new(HashMap::new()),
                updates: Mutex::new(HashMap::new()),
                watchers: Mutex::new(HashMap::new()),
                pending: Mutex::new(VecDeque::new()),
                committing: Mutex::new(()),
            }),
        }
    }

    /// Get the store's identity.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Get the configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Atoms
    // ------------------------------------------------------------------

    /// Get the context of `atom`.
    ///
    /// A retained atom yields its tracked context. Otherwise the result is a
    /// fresh context at the atom's initial state, which the store does not
    /// keep: reading an atom no one retains always sees its initial state.
    pub fn resolve_atom<S: State>(&self, atom: &Atom<S>) -> AtomContext<S> {
        let tracked = self.inner.atoms.lock().get(&atom.id()).cloned();
        let owner: Weak<dyn CellOwner> = Arc::<StoreInner>::downgrade(&self.inner);

        tracked
            .and_then(AtomContext::from_erased)
            .map(|context| context.owned_by(owner, atom.id()))
            .unwrap_or_else(|| {
                AtomContext::detached(Arc::from(atom.name()), Arc::clone(atom.initial_state()))
            })
    }

    /// Keep `atom`'s context alive until the returned handle is released.
    ///
    /// While any retainer is outstanding, every resolve of `atom` yields the
    /// same context. When the last one is released the context and its
    /// state are discarded.
    pub fn retain<S: State>(&self, atom: &Atom<S>) -> Release {
        self.inner.retain_key(atom.key())
    }

    /// Retain every atom in `sources`, released together.
    pub fn retain_all<Src: Sources>(&self, sources: &Src) -> Release {
        Release::merge(
            sources
                .keys()
                .into_iter()
                .map(|key| self.inner.retain_key(key)),
        )
    }

    /// Whether `atom` currently has a tracked context.
    pub fn is_tracked<S: State>(&self, atom: &Atom<S>) -> bool {
        self.inner.atoms.lock().contains_key(&atom.id())
    }

    /// Number of atoms with a tracked context.
    pub fn tracked_atom_count(&self) -> usize {
        self.inner.atoms.lock().len()
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Register `update` until the returned handle is released.
    ///
    /// Registrations sharing an id are one handler; releasing one of them
    /// leaves the handler active until the last is released.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateSource`] if `update` lists one atom
    /// more than once. With conflict checks on, returns
    /// [`StoreError::ConfigurationConflict`] if another update id on the
    /// same signal already declares one of `update`'s sources. Either way
    /// the registration has no effect.
    pub fn register_update<Src: Sources, D: Payload>(
        &self,
        update: Update<Src, D>,
    ) -> Result<Release> {
        let signal = update.signal().tag();
        let id = update.id();
        let update: Arc<dyn ErasedUpdate> = Arc::new(update);

        // The replaced handler drops after the lock, since it may own releases.
        let (handle, _replaced) = {
            let mut managers = self.inner.updates.lock();
            let manager = managers.entry(signal).or_insert_with(|| {
                debug!(%signal, name = update.signal_name(), "created update manager");
                UpdateManager::new(signal)
            });

            match manager.retain(Arc::clone(&update), self.inner.config.check_conflicts) {
                Ok(retained) => retained,
                Err(error) => {
                    if !manager.in_use() {
                        managers.remove(&signal);
                    }
                    return Err(error);
                }
            }
        };

        trace!(%signal, update = %id, "registered update");

        let inner = Arc::downgrade(&self.inner);
        Ok(Release::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.release_update(signal, id, handle);
            }
        }))
    }

    /// Number of distinct update ids registered for `signal`.
    pub fn handler_count<D: Payload>(&self, signal: &Signal<D>) -> usize {
        self.inner
            .updates
            .lock()
            .get(&signal.tag())
            .map_or(0, UpdateManager::len)
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    /// Call `callback` after every commit that changes `atom`.
    pub fn watch<S, F>(&self, atom: &Atom<S>, callback: F) -> Release
    where
        S: State,
        F: Fn() + Send + Sync + 'static,
    {
        let atom = atom.id();
        let subscriber = Subscriber::new(atom, callback);
        let subscriber_id = subscriber.id();

        self.inner
            .watchers
            .lock()
            .entry(atom)
            .or_default()
            .insert(subscriber_id, subscriber);

        let inner = Arc::downgrade(&self.inner);
        Release::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.unwatch(atom, subscriber_id);
            }
        })
    }

    /// Number of subscribers watching `atom`.
    pub fn watcher_count<S: State>(&self, atom: &Atom<S>) -> usize {
        self.inner
            .watchers
            .lock()
            .get(&atom.id())
            .map_or(0, IndexMap::len)
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Apply `event` to every update registered for its signal, then notify
    /// subscribers of the atoms that changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReentrantCommit`] when called from a handler or
    /// subscriber of this store while the store rejects re-entrant commits.
    /// Under [`ReentrancyPolicy::Queue`] such an event is queued instead and
    /// applied before the outer commit returns.
    ///
    /// If a handler fails or panics, events it queued are discarded.
    pub fn commit<D: Payload>(&self, event: Event<D>) -> Result<()> {
        let event = PendingEvent::new(event);

        let Some(_scope) = CommitScope::enter(self.inner.id) else {
            return self.inner.defer(event);
        };
        let _serial = self.inner.committing.lock();
        let _queue = DiscardPending(&self.inner.pending);

        self.inner.dispatch(&event)?;
        self.inner.drain()
    }

    /// Whether this store is committing on the current thread.
    pub fn is_committing(&self) -> bool {
        CommitScope::is_active(self.inner.id)
    }
}

/// Empties the re-entrant queue when the outermost commit exits, however
/// it exits.
struct DiscardPending<'a>(&'a Mutex<VecDeque<PendingEvent>>);

impl Drop for DiscardPending<'_> {
    fn drop(&mut self) {
        let stale = std::mem::take(&mut *self.0.lock());
        if !stale.is_empty() {
            warn!(count = stale.len(), "discarded queued commits");
        }
    }
}

impl StoreInner {
    fn retain_key(self: &Arc<Self>, key: AtomKey) -> Release {
        let atom = key.id;

        let (cell, handle) = {
            let mut atoms = self.atoms.lock();
            let cell = atoms
                .entry(atom)
                .or_insert_with(|| {
                    debug!(atom = %key.name, id = %atom, "tracking atom context");
                    key.fresh_cell()
                })
                .clone();
            let handle = cell.retain();
            (cell, handle)
        };

        let inner = Arc::downgrade(self);
        Release::new(move || {
            if let Some(inner) = Weak::upgrade(&inner) {
                inner.release_cell(atom, &cell, handle);
            }
        })
    }

    fn release_update(&self, signal: SignalTag, id: UpdateId, handle: RetainerId) {
        // Removed entries drop after the lock, since handlers may own releases.
        let (removed, evicted) = {
            let mut managers = self.updates.lock();
            let Some(manager) = managers.get_mut(&signal) else {
                return;
            };

            let removed = manager.release(id, handle);
            let evicted = if manager.in_use() {
                None
            } else {
                managers.remove(&signal)
            };
            (removed, evicted)
        };

        if removed.is_some() {
            trace!(%signal, update = %id, "removed update");
        }
        if evicted.is_some() {
            debug!(%signal, "evicted update manager");
        }
    }

    fn unwatch(&self, atom: AtomId, subscriber: SubscriberId) {
        let removed = {
            let mut watchers = self.watchers.lock();
            let Some(subscribers) = watchers.get_mut(&atom) else {
                return;
            };

            let removed = subscribers.shift_remove(&subscriber);
            if subscribers.is_empty() {
                watchers.remove(&atom);
            }
            removed
        };
        drop(removed);
    }

    /// Handle a commit issued while this store is already committing.
    fn defer(&self, event: PendingEvent) -> Result<()> {
        match self.config.reentrancy {
            ReentrancyPolicy::Reject => {
                warn!(signal = %event.name, "rejected re-entrant commit");
                Err(StoreError::ReentrantCommit {
                    signal: event.name.to_string(),
                })
            }
            ReentrancyPolicy::Queue => {
                trace!(signal = %event.name, "queued re-entrant commit");
                self.pending.lock().push_back(event);
                Ok(())
            }
        }
    }

    /// Apply queued events, breadth-first, until none remain.
    fn drain(&self) -> Result<()> {
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(event) => self.dispatch(&event)?,
                None => return Ok(()),
            }
        }
    }

    fn dispatch(&self, event: &PendingEvent) -> Result<()> {
        let mut updates = Vec::new();
        {
            let managers = self.updates.lock();
            let Some(manager) = managers.get(&event.signal) else {
                trace!(signal = %event.name, "no updates registered");
                return Ok(());
            };
            manager.for_each_update(|update| updates.push(Arc::clone(update)));
        }

        let mut changed = IndexSet::new();
        for update in &updates {
            self.apply(update.as_ref(), event.data.as_ref(), &mut changed)?;
        }

        debug!(
            signal = %event.name,
            updates = updates.len(),
            changed = changed.len(),
            "committed event"
        );

        self.notify(&changed);
        Ok(())
    }

    /// Run one update as a transaction over its sources.
    fn apply(
        &self,
        update: &dyn ErasedUpdate,
        data: &dyn Any,
        changed: &mut IndexSet<AtomId>,
    ) -> Result<()> {
        let cells: Vec<Arc<dyn ErasedCell>> = {
            let atoms = self.atoms.lock();
            update
                .sources()
                .iter()
                .map(|key| atoms.get(&key.id).cloned().unwrap_or_else(|| key.fresh_cell()))
                .collect()
        };

        let snapshots: Vec<_> = cells.iter().map(|cell| cell.snapshot_erased()).collect();
        let next = update.apply(&snapshots, data)?;

        for ((key, cell), state) in update.sources().iter().zip(&cells).zip(next) {
            if cell.replace_erased(state)? {
                changed.insert(key.id);
            }
        }

        trace!(update = %update.id(), "applied update");
        Ok(())
    }

    /// Notify subscribers of tracked, changed atoms.
    fn notify(&self, changed: &IndexSet<AtomId>) {
        if changed.is_empty() {
            return;
        }

        let subscribers: Vec<Subscriber> = {
            let atoms = self.atoms.lock();
            let watchers = self.watchers.lock();
            changed
                .iter()
                .filter(|atom| atoms.contains_key(*atom))
                .filter_map(|atom| watchers.get(atom))
                .flat_map(|subscribers| subscribers.values().cloned())
                .collect()
        };

        trace!(count = subscribers.len(), "notifying subscribers");
        for subscriber in subscribers {
            subscriber.notify();
        }
    }
}

impl CellOwner for StoreInner {
    fn retain_cell(&self, cell: &Arc<dyn ErasedCell>) -> RetainerId {
        let _atoms = self.atoms.lock();
        cell.retain()
    }

    fn release_cell(&self, atom: AtomId, cell: &Arc<dyn ErasedCell>, handle: RetainerId) {
        let evicted = {
            let mut atoms = self.atoms.lock();
            cell.release(handle);

            let tracked = atoms
                .get(&atom)
                .is_some_and(|current| same_cell(current, cell));
            if tracked && !cell.in_use() {
                atoms.remove(&atom)
            } else {
                None
            }
        };

        if evicted.is_some() {
            debug!(id = %atom, "evicted atom context");
        }
    }
}

/// Compare cells by address; vtable pointers of one type may differ.
fn same_cell(a: &Arc<dyn ErasedCell>, b: &Arc<dyn ErasedCell>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("tracked_atoms", &self.tracked_atom_count())
            .field("signals", &self.inner.updates.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
