//! Store configuration.
//!
//! ```rust
//! use strata_core::{ReentrancyPolicy, StoreConfig};
//!
//! let config = StoreConfig::from_json(r#"{ "reentrancy": "queue" }"#).unwrap();
//! assert_eq!(config.reentrancy, ReentrancyPolicy::Queue);
//! ```

use serde::Deserialize;

use super::error::Result;

/// What `commit` does when called while the same store is committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentrancyPolicy {
    /// Return [`StoreError::ReentrantCommit`](super::StoreError::ReentrantCommit)
    /// and drop the event.
    #[default]
    Reject,

    /// Queue the event and apply it after the running commit has notified
    /// its subscribers, before the outermost `commit` returns.
    Queue,
}

/// Settings for a [`Store`](super::Store).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Reject updates whose sources overlap another update on the same
    /// signal. On by default in debug builds.
    pub check_conflicts: bool,

    /// Handling of re-entrant commits.
    pub reentrancy: ReentrancyPolicy,
}

impl StoreConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set whether conflicting registrations are rejected.
    pub fn with_conflict_checks(mut self, enabled: bool) -> Self {
        self.check_conflicts = enabled;
        self
    }

    /// Set the re-entrancy policy.
    pub fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            check_conflicts: cfg!(debug_assertions),
            reentrancy: ReentrancyPolicy::default(),
        }
    }
}
