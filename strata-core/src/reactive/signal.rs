//! Signal Definitions
//!
//! A Signal names an event type in the application. Updates listen for a
//! signal and change atoms in response; callers produce events with
//! [`Signal::create`] and hand them to [`Store::commit`](crate::Store::commit).
//!
//! # Identity
//!
//! Each signal is issued a [`SignalTag`] on creation. Events carry the tag,
//! and the store routes on the tag alone. Two signals with the same name are
//! unrelated.

use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;

use super::ids::SignalTag;

/// Bound satisfied by every type that can travel as event data.
pub trait Payload: Send + Sync + 'static {}

impl<T> Payload for T where T: Send + Sync + 'static {}

/// A named event type carrying data of type `D`.
///
/// # Example
///
/// ```rust
/// use strata_core::Signal;
///
/// let increment = Signal::<i32>::new("counter.increment");
/// let event = increment.create(5);
///
/// assert_eq!(event.signal_type(), increment.tag());
/// assert_eq!(event.data, 5);
/// ```
pub struct Signal<D: Payload> {
    tag: SignalTag,
    name: Arc<str>,
    _data: PhantomData<fn(D)>,
}

impl<D: Payload> Signal<D> {
    /// Define a new signal.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            tag: SignalTag::new(),
            name: name.into(),
            _data: PhantomData,
        }
    }

    /// Get the dispatch key.
    pub fn tag(&self) -> SignalTag {
        self.tag
    }

    /// Get the diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build an event for this signal.
    pub fn create(&self, data: D) -> Event<D> {
        Event {
            signal_type: self.tag,
            name: Arc::clone(&self.name),
            data,
        }
    }
}

impl<D: Payload> Clone for Signal<D> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            name: Arc::clone(&self.name),
            _data: PhantomData,
        }
    }
}

impl<D: Payload> Debug for Signal<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish()
    }
}

/// An occurrence of a signal.
#[derive(Clone)]
pub struct Event<D> {
    signal_type: SignalTag,
    name: Arc<str>,

    /// Data carried with the event.
    pub data: D,
}

impl<D> Event<D> {
    /// The tag of the signal that produced this event.
    pub fn signal_type(&self) -> SignalTag {
        self.signal_type
    }

    /// The producing signal's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (SignalTag, Arc<str>, D) {
        (self.signal_type, self.name, self.data)
    }
}

impl<D: Debug> Debug for Event<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.signal_type)
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
