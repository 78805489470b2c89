//! Update Manager
//!
//! One manager per signal tag in use. It owns the updates registered for
//! that signal, keyed by update id, and the retainers of each id.
//!
//! # Invariants
//!
//! - Updates iterate in the order their id was first registered.
//!   Re-registering an id replaces its handler in place.
//! - An id stays registered while at least one of its retainers is live.
//! - An update lists each source atom at most once, so every source has a
//!   single draft to write back.
//! - With conflict checks on, no two distinct ids share a source atom.
//!   Two handlers writing one atom on the same signal would make the final
//!   state depend on their order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use super::error::{Result, StoreError};
use super::update::ErasedUpdate;
use crate::reactive::{RetainerId, SignalTag, UpdateId};

/// Registry of the updates bound to one signal.
pub(crate) struct UpdateManager {
    signal: SignalTag,

    /// Latest registration for each id, in first-registration order.
    registered: IndexMap<UpdateId, Arc<dyn ErasedUpdate>>,

    /// Live attachments per id.
    retainers: HashMap<UpdateId, HashSet<RetainerId>>,
}

impl UpdateManager {
    pub(crate) fn new(signal: SignalTag) -> Self {
        Self {
            signal,
            registered: IndexMap::new(),
            retainers: HashMap::new(),
        }
    }

    /// Register or refresh `update` and add one retainer for its id.
    ///
    /// Returns the new retainer and the registration `update` replaced, if
    /// any, for the caller to drop once its locks are released. On an error
    /// nothing changes.
    pub(crate) fn retain(
        &mut self,
        update: Arc<dyn ErasedUpdate>,
        check_conflicts: bool,
    ) -> Result<(RetainerId, Option<Arc<dyn ErasedUpdate>>)> {
        debug_assert_eq!(update.signal(), self.signal);

        check_duplicates(update.as_ref())?;
        if check_conflicts {
            self.check_conflicts(update.as_ref())?;
        }

        let id = update.id();
        let handle = RetainerId::new();

        // Insert on an existing key keeps its position.
        let replaced = self.registered.insert(id, update);
        self.retainers.entry(id).or_default().insert(handle);

        Ok((handle, replaced))
    }

    /// Drop one retainer of `id`. The update is removed with its last one.
    ///
    /// Returns the removed update, if any, so the caller can drop it after
    /// releasing its locks.
    pub(crate) fn release(
        &mut self,
        id: UpdateId,
        handle: RetainerId,
    ) -> Option<Arc<dyn ErasedUpdate>> {
        let handles = self.retainers.get_mut(&id)?;

        handles.remove(&handle);
        if !handles.is_empty() {
            return None;
        }

        self.retainers.remove(&id);
        self.registered.shift_remove(&id)
    }

    /// Visit every registered update once, in registration order.
    pub(crate) fn for_each_update<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<dyn ErasedUpdate>),
    {
        for update in self.registered.values() {
            f(update);
        }
    }

    pub(crate) fn in_use(&self) -> bool {
        !self.registered.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.registered.len()
    }

    /// Reject `update` if any other id already declares one of its sources.
    fn check_conflicts(&self, update: &dyn ErasedUpdate) -> Result<()> {
        let claimed: HashMap<_, _> = self
            .registered
            .iter()
            .filter(|(id, _)| **id != update.id())
            .flat_map(|(id, other)| other.sources().iter().map(move |key| (key.id, *id)))
            .collect();

        for key in update.sources() {
            if let Some(existing) = claimed.get(&key.id) {
                warn!(
                    signal = update.signal_name(),
                    atom = %key.name,
                    update = %update.id(),
                    %existing,
                    "rejected conflicting update registration"
                );
                return Err(StoreError::ConfigurationConflict {
                    signal: update.signal_name().to_string(),
                    atom: key.name.to_string(),
                    existing: *existing,
                });
            }
        }

        Ok(())
    }
}

fn check_duplicates(update: &dyn ErasedUpdate) -> Result<()> {
    let mut seen = HashSet::new();
    match update.sources().iter().find(|key| !seen.insert(key.id)) {
        Some(key) => {
            warn!(
                signal = update.signal_name(),
                atom = %key.name,
                update = %update.id(),
                "rejected update with a repeated source"
            );
            Err(StoreError::DuplicateSource {
                signal: update.signal_name().to_string(),
                atom: key.name.to_string(),
            })
        }
        None => Ok(()),
    }
}
