//! Opaque identities.
//!
//! Every identity in the store is a token issued from a process-wide
//! monotonic counter. Names attached to atoms and signals are diagnostic
//! labels only; two definitions with the same name still get distinct ids.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Issue a fresh id, distinct from every id issued before it.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw counter value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of an [`Atom`](super::Atom) definition. Shared by its clones.
    AtomId,
    "atom"
);

define_id!(
    /// Dispatch key of a [`Signal`](super::Signal). Events carry this tag,
    /// never the signal's name.
    SignalTag,
    "signal"
);

define_id!(
    /// Deduplication key of an update handler.
    ///
    /// Registrations that share an id are one logical handler: they run once
    /// per commit and stay registered until every attachment is released.
    UpdateId,
    "update"
);

define_id!(
    /// One outstanding retain on an atom context or update registration.
    RetainerId,
    "retainer"
);

define_id!(
    /// One watch on an atom. Attaching the same closure twice yields two
    /// subscribers, each notified once per change.
    SubscriberId,
    "subscriber"
);

define_id!(
    /// Identity of a store instance, used by the commit scope.
    StoreId,
    "store"
);
