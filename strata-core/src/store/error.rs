//! Store errors.

use thiserror::Error;

use crate::reactive::UpdateId;

/// Errors raised by store operations.
///
/// Every error is returned from the call that caused it. A failed call
/// leaves the store as it was.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Two independently registered updates on one signal declared the same
    /// source atom.
    #[error("update conflict on signal `{signal}`: atom `{atom}` is already a source of {existing}")]
    ConfigurationConflict {
        signal: String,
        atom: String,
        existing: UpdateId,
    },

    /// One update listed the same source atom more than once.
    #[error("update on signal `{signal}` lists atom `{atom}` more than once")]
    DuplicateSource { signal: String, atom: String },

    /// `commit` was called on a store that is already committing on this
    /// thread, and the store rejects re-entrant commits.
    #[error("re-entrant commit of signal `{signal}` while the store is committing")]
    ReentrantCommit { signal: String },

    /// An erased snapshot did not match its atom's state type.
    #[error("snapshot held for atom `{atom}` does not match its state type")]
    StateType { atom: String },

    /// An event payload did not match its signal's data type.
    #[error("payload for signal `{signal}` does not match its data type")]
    PayloadType { signal: String },

    /// The store configuration could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
