//! Store
//!
//! The registry that owns atom state, routes signals to update handlers and
//! notifies subscribers of changes.
//!
//! # Overview
//!
//! - Atom contexts are reference counted. The first [`Store::retain`] of an
//!   atom creates its context; releasing the last retainer discards it.
//! - Updates are grouped by signal into update managers, deduplicated by
//!   [`UpdateId`](crate::UpdateId) and reference counted the same way.
//! - [`Store::commit`] applies every update for an event as its own
//!   transaction, then notifies subscribers of the atoms that changed.
//!
//! # Design Decisions
//!
//! 1. Conflicts are rejected at registration, not at commit. Two updates on
//!    one signal may not both write an atom, so the order handlers run in
//!    never decides the final state.
//!
//! 2. Notification waits until every update for the event has run. A
//!    subscriber sees one consistent state per commit and runs once even if
//!    several updates touched its atom.

mod config;
mod error;
mod manager;
mod release;
#[allow(clippy::module_inception)]
mod store;
mod update;

pub use config::{ReentrancyPolicy, StoreConfig};
pub use error::{Result, StoreError};
pub use release::Release;
pub use store::Store;
pub use update::{SharedUpdate, Update};
