//! Update Registrations
//!
//! An update binds a handler to one signal and an ordered list of source
//! atoms. When the signal fires, the store hands the handler a draft of each
//! source and commits whatever the handler wrote.
//!
//! # Identity
//!
//! Updates are deduplicated by [`UpdateId`]. [`Update::new`] issues a fresh
//! id, so every registration is its own handler. To share one handler across
//! many attachment points, build them from one [`SharedUpdate`] (or pass the
//! same id to [`Update::with_id`]); the store then runs the handler once per
//! commit and keeps it until every attachment is released.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use super::error::{Result, StoreError};
use crate::reactive::{
    AtomKey, ErasedState, Payload, Signal, SignalTag, SourceList, Sources, UpdateId,
};

type Handler<Src, D> = Arc<dyn Fn(&mut <Src as Sources>::Drafts, &D) + Send + Sync>;

/// A transactional handler bound to a signal and its source atoms.
///
/// # Example
///
/// ```rust
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
/// store.commit(increment.create(5)).unwrap();
/// assert_eq!(*store.resolve_atom(&counter).snapshot(), 5);
/// ```
pub struct Update<Src: Sources, D: Payload> {
    id: UpdateId,
    signal: Signal<D>,
    sources: Src,
    keys: SourceList<AtomKey>,
    handler: Handler<Src, D>,
}

impl<Src: Sources, D: Payload> Update<Src, D> {
    /// Create an update with a fresh id.
    pub fn new<F>(signal: &Signal<D>, sources: Src, handler: F) -> Self
    where
        F: Fn(&mut Src::Drafts, &D) + Send + Sync + 'static,
    {
        Self::with_id(UpdateId::new(), signal, sources, handler)
    }

    /// Create an update under a caller-chosen id.
    pub fn with_id<F>(id: UpdateId, signal: &Signal<D>, sources: Src, handler: F) -> Self
    where
        F: Fn(&mut Src::Drafts, &D) + Send + Sync + 'static,
    {
        let keys = sources.keys();
        Self {
            id,
            signal: signal.clone(),
            sources,
            keys,
            handler: Arc::new(handler),
        }
    }

    /// Get the deduplication id.
    pub fn id(&self) -> UpdateId {
        self.id
    }

    /// Get the triggering signal.
    pub fn signal(&self) -> &Signal<D> {
        &self.signal
    }

    /// Get the declared sources.
    pub fn sources(&self) -> &Src {
        &self.sources
    }
}

impl<Src: Sources, D: Payload> Clone for Update<Src, D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            signal: self.signal.clone(),
            sources: self.sources.clone(),
            keys: self.keys.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<Src: Sources, D: Payload> Debug for Update<Src, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("id", &self.id)
            .field("signal", &self.signal)
            .field("sources", &self.keys)
            .finish()
    }
}

/// A signal bound to one update id, for handlers attached from many places.
///
/// ```rust
/// use strata_core::{Atom, SharedUpdate, Signal};
///
/// let counter = Atom::new("counter", 0);
/// let increment = SharedUpdate::new(Signal::<i32>::new("counter.increment"));
///
/// let a = increment.bind(counter.clone(), |count, by| **count += by);
/// let b = increment.bind(counter.clone(), |count, by| **count += by);
/// assert_eq!(a.id(), b.id());
/// ```
pub struct SharedUpdate<D: Payload> {
    id: UpdateId,
    signal: Signal<D>,
}

impl<D: Payload> SharedUpdate<D> {
    pub fn new(signal: Signal<D>) -> Self {
        Self {
            id: UpdateId::new(),
            signal,
        }
    }

    pub fn id(&self) -> UpdateId {
        self.id
    }

    pub fn signal(&self) -> &Signal<D> {
        &self.signal
    }

    /// Build an attachment of the shared handler.
    pub fn bind<Src, F>(&self, sources: Src, handler: F) -> Update<Src, D>
    where
        Src: Sources,
        F: Fn(&mut Src::Drafts, &D) + Send + Sync + 'static,
    {
        Update::with_id(self.id, &self.signal, sources, handler)
    }
}

impl<D: Payload> Clone for SharedUpdate<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            signal: self.signal.clone(),
        }
    }
}

impl<D: Payload> Debug for SharedUpdate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedUpdate")
            .field("id", &self.id)
            .field("signal", &self.signal)
            .finish()
    }
}

/// What the store needs from an update, with sources and payload erased.
pub(crate) trait ErasedUpdate: Send + Sync {
    fn id(&self) -> UpdateId;

    fn signal(&self) -> SignalTag;

    fn signal_name(&self) -> &str;

    fn sources(&self) -> &[AtomKey];

    /// Run the handler over drafts of `snapshots` and return the resulting
    /// snapshots, positionally matching the sources.
    fn apply(&self, snapshots: &[ErasedState], data: &dyn Any) -> Result<SourceList<ErasedState>>;
}

impl Debug for dyn ErasedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedUpdate")
            .field("id", &self.id())
            .field("signal", &self.signal_name())
            .finish()
    }
}

impl<Src: Sources, D: Payload> ErasedUpdate for Update<Src, D> {
    fn id(&self) -> UpdateId {
        self.id
    }

    fn signal(&self) -> SignalTag {
        self.signal.tag()
    }

    fn signal_name(&self) -> &str {
        self.signal.name()
    }

    fn sources(&self) -> &[AtomKey] {
        &self.keys
    }

    fn apply(&self, snapshots: &[ErasedState], data: &dyn Any) -> Result<SourceList<ErasedState>> {
        let data = data
            .downcast_ref::<D>()
            .ok_or_else(|| StoreError::PayloadType {
                signal: self.signal.name().to_string(),
            })?;

        let mut drafts = self.sources.draft(snapshots)?;
        (self.handler)(&mut drafts, data);
        Ok(Src::settle(drafts))
    }
}
