//! Strata Core
//!
//! This crate provides the core of the Strata reactive state container.
//! It implements:
//!
//! - Atoms: named cells of immutable state
//! - Signals: typed event definitions
//! - Updates: transactional handlers that change atoms when a signal fires
//! - The Store: the registry that owns atom state, routes events and
//!   notifies subscribers
//!
//! Atom state and update registrations are reference counted. State no one
//! retains is discarded, and reading it again yields the atom's initial
//! value.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: Definitions, drafts and per-atom cells
//! - `store`: The registry, update managers, configuration and errors
//!
//! # Example
//!
//! ```rust
//! use strata_core::{Atom, Signal, Store, Update};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Counter {
//!     value: i32,
//! }
//!
//! let counter = Atom::new("counter", Counter { value: 0 });
//! let increment = Signal::<i32>::new("counter.increment");
//!
//! let store = Store::new();
//!
//! // Keep the atom alive and attach a handler
//! let _retainer = store.retain(&counter);
//! let _update = store
//!     .register_update(Update::new(&increment, counter.clone(), |counter, by| {
//!         counter.value += by;
//!     }))
//!     .unwrap();
//!
//! // Dispatch an event
//! store.commit(increment.create(5)).unwrap();
//! assert_eq!(store.resolve_atom(&counter).snapshot().value, 5);
//! ```

pub mod reactive;
pub mod store;

pub use reactive::{
    Atom, AtomContext, AtomId, Draft, Event, Payload, RetainerId, Signal, SignalTag, Sources,
    State, StoreId, Subscriber, SubscriberId, UpdateId,
};
pub use store::{ReentrancyPolicy, Release, Result, SharedUpdate, Store, StoreConfig, StoreError, Update};
