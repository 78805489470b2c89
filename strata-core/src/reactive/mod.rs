//! Reactive Primitives
//!
//! The definitions application code declares and the per-atom cells the
//! store keeps at runtime.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom is a named piece of state with an initial value. It can only
//! change in response to a signal, through an update registered with the
//! store.
//!
//! ## Signals
//!
//! A Signal names an event type. Calling [`Signal::create`] yields an
//! [`Event`] carrying the signal's tag and a data payload.
//!
//! ## Drafts
//!
//! Update handlers mutate [`Draft`]s of their source atoms. A draft clones
//! its snapshot only on first mutable access and keeps the original
//! allocation when the result is unchanged, so the store can detect changes
//! by comparing pointers.
//!
//! # Implementation Notes
//!
//! The store holds atoms of many state types in one map. Cells and snapshots
//! are type-erased behind `Arc<dyn Any>` inside the store and recovered with
//! a downcast keyed on the atom's identity, which always matches.

mod ids;
mod atom;
mod signal;
mod draft;
mod sources;
mod context;
mod subscriber;
mod scope;

pub use ids::{AtomId, SignalTag, UpdateId, RetainerId, SubscriberId, StoreId};
pub use atom::{Atom, State};
pub use signal::{Signal, Event, Payload};
pub use draft::Draft;
pub use sources::Sources;
pub use context::AtomContext;
pub use subscriber::Subscriber;

pub(crate) use atom::{AtomKey, ErasedState};
pub(crate) use context::{CellOwner, ErasedCell};
pub(crate) use scope::CommitScope;
pub(crate) use sources::SourceList;
