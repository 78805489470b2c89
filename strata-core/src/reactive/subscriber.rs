//! Watchers of an atom.
//!
//! [`Store::watch`](crate::Store::watch) wraps its callback in a
//! [`Subscriber`] bound to the watched atom. The store calls it once for
//! every commit that changes that atom's snapshot.

use std::fmt;
use std::sync::Arc;

use super::ids::{AtomId, SubscriberId};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// A change callback attached to one atom.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    atom: AtomId,
    callback: Callback,
}

impl Subscriber {
    pub(crate) fn new<F>(atom: AtomId, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            atom,
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The atom this subscriber watches.
    pub fn atom(&self) -> AtomId {
        self.atom
    }

    pub(crate) fn notify(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("atom", &self.atom)
            .finish()
    }
}
